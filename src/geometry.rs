//! Mapping between the on-screen designer space and document space.
//!
//! Screen space: origin top-left, y down, multiplied by the zoom scale.
//! Stored field positions use the same top-left, y-down convention as
//! the screen, so the forward transform only un-scales and un-offsets.
//! The flip into PDF space (origin bottom-left, y up) happens in exactly
//! one place, `pdf_space_y`, consumed only by the drawing layer.

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Convert a screen-pixel point to a document-native point.
///
/// Clicks outside the rendered page clamp to >= 0 before storage.
pub fn screen_to_doc(p: Point, scale: f64, page_origin: Point) -> Point {
    Point {
        x: ((p.x - page_origin.x) / scale).max(0.0),
        y: ((p.y - page_origin.y) / scale).max(0.0),
    }
}

/// Inverse of `screen_to_doc` for in-bounds points.
pub fn doc_to_screen(p: Point, scale: f64, page_origin: Point) -> Point {
    Point {
        x: p.x * scale + page_origin.x,
        y: p.y * scale + page_origin.y,
    }
}

/// The single y-flip between stored (top-left, y-down) coordinates and
/// PDF (bottom-left, y-up) coordinates.
pub fn pdf_space_y(page_height: f64, y: f64, height: f64) -> f64 {
    page_height - y - height
}
