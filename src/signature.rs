//! Freehand signature capture. Strokes are recorded as polylines and
//! rasterized on export to a transparent RGBA PNG, handed to the
//! session as a data URL. Exporting an empty surface is a no-op so a
//! previously captured signature can never be overwritten by nothing.

const INK_RADIUS: f32 = 1.5;
const STEP: f32 = 0.5;

pub struct SignaturePad {
    width: u32,
    height: u32,
    strokes: Vec<Vec<(f32, f32)>>,
    current: Option<Vec<(f32, f32)>>,
}

impl SignaturePad {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            strokes: vec![],
            current: None,
        }
    }

    pub fn begin_stroke(&mut self, x: f32, y: f32) {
        self.current = Some(vec![(x, y)]);
    }

    pub fn extend_stroke(&mut self, x: f32, y: f32) {
        if let Some(stroke) = self.current.as_mut() {
            stroke.push((x, y));
        }
    }

    pub fn end_stroke(&mut self) {
        if let Some(stroke) = self.current.take() {
            if !stroke.is_empty() {
                self.strokes.push(stroke);
            }
        }
    }

    pub fn clear(&mut self) {
        self.strokes.clear();
        self.current = None;
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty() && self.current.as_ref().map_or(true, |s| s.is_empty())
    }

    /// Rasterize to a PNG, or `None` when nothing has been drawn.
    pub fn export_png(&self) -> Option<Vec<u8>> {
        if self.is_empty() {
            return None;
        }

        let mut buf = vec![0u8; (self.width * self.height * 4) as usize];
        for stroke in self.strokes.iter().chain(self.current.as_ref()) {
            self.rasterize_stroke(&mut buf, stroke);
        }

        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, self.width, self.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().ok()?;
            writer.write_image_data(&buf).ok()?;
        }
        Some(out)
    }

    /// Data-URL form of `export_png`, the shape the field-value map stores.
    pub fn export_data_url(&self) -> Option<String> {
        let png = self.export_png()?;
        Some(format!(
            "data:image/png;base64,{}",
            base64::encode_config(png, base64::STANDARD)
        ))
    }

    fn rasterize_stroke(&self, buf: &mut [u8], stroke: &[(f32, f32)]) {
        match stroke {
            [] => {}
            [p] => self.stamp(buf, p.0, p.1),
            _ => {
                for pair in stroke.windows(2) {
                    let (x0, y0) = pair[0];
                    let (x1, y1) = pair[1];
                    let len = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
                    let steps = (len / STEP).ceil().max(1.0) as u32;
                    for i in 0..=steps {
                        let t = i as f32 / steps as f32;
                        self.stamp(buf, x0 + (x1 - x0) * t, y0 + (y1 - y0) * t);
                    }
                }
            }
        }
    }

    fn stamp(&self, buf: &mut [u8], cx: f32, cy: f32) {
        let r = INK_RADIUS;
        let x_min = ((cx - r).floor().max(0.0)) as u32;
        let y_min = ((cy - r).floor().max(0.0)) as u32;
        let x_max = ((cx + r).ceil() as u32).min(self.width.saturating_sub(1));
        let y_max = ((cy + r).ceil() as u32).min(self.height.saturating_sub(1));
        for y in y_min..=y_max {
            for x in x_min..=x_max {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                if dx * dx + dy * dy <= r * r {
                    let idx = ((y * self.width + x) * 4) as usize;
                    buf[idx] = 0;
                    buf[idx + 1] = 0;
                    buf[idx + 2] = 0;
                    buf[idx + 3] = 255;
                }
            }
        }
    }
}
