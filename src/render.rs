//! A zoomable single-page view over a loaded document. Loading is
//! asynchronous from the caller's point of view: until `load` has
//! succeeded there are no page dimensions, and `click` is a safe no-op
//! so unresolved dimensions can never reach the coordinate transform.

use crate::error::Error;
use crate::geometry::{self, Point};
use crate::pdf;
use crate::{Config, ZOOM_LADDER};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageInfo {
    pub num_pages: u32,
    pub page_width: f64,
    pub page_height: f64,
}

pub struct PageRenderer {
    doc: Option<pdf::Document>,
    page: u32,
    scale: f64,
    min_zoom: f64,
    max_zoom: f64,
}

impl PageRenderer {
    pub fn new(config: &Config) -> Self {
        Self {
            doc: None,
            page: 1,
            scale: 1.0,
            min_zoom: config.min_zoom,
            max_zoom: config.max_zoom,
        }
    }

    pub fn load(&mut self, bytes: &[u8]) -> Result<PageInfo, Error> {
        let doc = pdf::Document::load(bytes)?;
        if doc.page_count() == 0 {
            return Err(Error::PageNotFound(1));
        }
        self.doc = Some(doc);
        self.page = 1;
        Ok(self.info().unwrap())
    }

    pub fn is_loaded(&self) -> bool {
        self.doc.is_some()
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Page count and the current page's dimensions, once available.
    pub fn info(&self) -> Option<PageInfo> {
        let doc = self.doc.as_ref()?;
        let (page_width, page_height) = doc.page_size(self.page).ok()?;
        Some(PageInfo {
            num_pages: doc.page_count(),
            page_width,
            page_height,
        })
    }

    pub fn first_page(&mut self) -> u32 {
        self.page = 1;
        self.page
    }

    pub fn prev_page(&mut self) -> u32 {
        self.page = self.page.saturating_sub(1).max(1);
        self.page
    }

    pub fn next_page(&mut self) -> u32 {
        if let Some(doc) = &self.doc {
            self.page = (self.page + 1).min(doc.page_count());
        }
        self.page
    }

    pub fn last_page(&mut self) -> u32 {
        if let Some(doc) = &self.doc {
            self.page = doc.page_count();
        }
        self.page
    }

    pub fn set_scale(&mut self, scale: f64) -> f64 {
        self.scale = scale.clamp(self.min_zoom, self.max_zoom);
        self.scale
    }

    pub fn zoom_in(&mut self) -> f64 {
        let next = ZOOM_LADDER
            .iter()
            .copied()
            .find(|&s| s > self.scale + f64::EPSILON)
            .unwrap_or(self.scale);
        self.set_scale(next)
    }

    pub fn zoom_out(&mut self) -> f64 {
        let next = ZOOM_LADDER
            .iter()
            .rev()
            .copied()
            .find(|&s| s < self.scale - f64::EPSILON)
            .unwrap_or(self.scale);
        self.set_scale(next)
    }

    /// Convert a click on the rendered page to a document-native point.
    /// Returns `None` until the page has finished loading.
    pub fn click(&self, screen: Point, page_origin: Point) -> Option<Point> {
        if self.info().is_none() {
            debug!("click ignored, page not loaded yet");
            return None;
        }
        Some(geometry::screen_to_doc(screen, self.scale, page_origin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::test_support::blank_pdf;

    fn loaded(pages: u32) -> PageRenderer {
        let mut r = PageRenderer::new(&Config::default());
        r.load(&blank_pdf(pages)).unwrap();
        r
    }

    #[test]
    fn click_is_noop_before_load() {
        let r = PageRenderer::new(&Config::default());
        assert!(r.info().is_none());
        assert!(r.click(Point::new(120.0, 80.0), Point::new(0.0, 0.0)).is_none());
    }

    #[test]
    fn load_reports_page_info() {
        let r = loaded(3);
        let info = r.info().unwrap();
        assert_eq!(info.num_pages, 3);
        assert_eq!(info.page_width, 595.0);
        assert_eq!(info.page_height, 842.0);
    }

    #[test]
    fn click_unscales() {
        let mut r = loaded(1);
        r.set_scale(1.5);
        let p = r.click(Point::new(120.0, 80.0), Point::new(0.0, 0.0)).unwrap();
        assert!((p.x - 80.0).abs() < 1e-9);
        assert!((p.y - 80.0 / 1.5).abs() < 1e-9);
    }

    #[test]
    fn navigation_clamps_to_document() {
        let mut r = loaded(3);
        assert_eq!(r.prev_page(), 1);
        assert_eq!(r.last_page(), 3);
        assert_eq!(r.next_page(), 3);
        assert_eq!(r.prev_page(), 2);
        assert_eq!(r.first_page(), 1);
    }

    #[test]
    fn zoom_steps_the_ladder_and_clamps() {
        let mut r = loaded(1);
        assert_eq!(r.zoom_in(), 1.25);
        assert_eq!(r.zoom_in(), 1.5);
        for _ in 0..10 {
            r.zoom_in();
        }
        assert_eq!(r.scale(), 3.0);
        for _ in 0..20 {
            r.zoom_out();
        }
        assert_eq!(r.scale(), 0.5);
        assert_eq!(r.set_scale(100.0), 3.0);
        assert_eq!(r.set_scale(0.01), 0.5);
    }
}
