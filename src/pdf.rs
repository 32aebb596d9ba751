//! Low-level drawing onto an existing PDF. Each touched page gets one
//! extra content stream appended to its `Contents`; existing streams
//! are never rewritten. All box positions pass through
//! `geometry::pdf_space_y` here and nowhere else.

use std::io::Write;

use crate::error::Error;
use crate::geometry;

const HELVETICA: (&str, &str) = ("F_docsign_Helvetica", "Helvetica");
const DINGBATS: (&str, &str) = ("F_docsign_ZapfDingbats", "ZapfDingbats");

/// ZapfDingbats character `4`, the check glyph.
const CHECK_GLYPH: &str = "4";

pub struct Document {
    inner: lopdf::Document,
    pages: std::collections::BTreeMap<u32, lopdf::ObjectId>,
    font_ids: std::collections::HashMap<&'static str, lopdf::ObjectId>,
}

struct BoundingBox {
    ll: (f64, f64),
    ur: (f64, f64),
}

struct PdfSpacePos {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

pub struct DocumentPage<'a> {
    doc: &'a mut Document,
    page_id: lopdf::ObjectId,
    media_box: BoundingBox,
    ops: Vec<lopdf::content::Operation>,
    fonts: Vec<(&'static str, &'static str)>,
    xobjects: Vec<(String, lopdf::ObjectId)>,
}

impl Document {
    pub fn load(bytes: &[u8]) -> Result<Self, Error> {
        let doc = lopdf::Document::load_mem(bytes)?;
        Ok(Self {
            pages: doc.get_pages(),
            inner: doc,
            font_ids: std::collections::HashMap::new(),
        })
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Page width and height from the (possibly inherited) MediaBox.
    pub fn page_size(&self, page: u32) -> Result<(f64, f64), Error> {
        let media_box = self.media_box(page)?;
        Ok((
            media_box.ur.0 - media_box.ll.0,
            media_box.ur.1 - media_box.ll.1,
        ))
    }

    pub fn page(&mut self, page: u32) -> Result<DocumentPage, Error> {
        let page_id = match self.pages.get(&page) {
            Some(i) => *i,
            None => return Err(Error::PageNotFound(page)),
        };
        let media_box = self.media_box(page)?;

        Ok(DocumentPage {
            doc: self,
            page_id,
            media_box,
            ops: vec![],
            fonts: vec![],
            xobjects: vec![],
        })
    }

    pub fn save(mut self) -> Result<Vec<u8>, Error> {
        let mut out = Vec::new();
        self.inner
            .save_to(&mut out)
            .map_err(|e| Error::Pdf(lopdf::Error::IO(e)))?;
        Ok(out)
    }

    fn media_box(&self, page: u32) -> Result<BoundingBox, Error> {
        let page_id = match self.pages.get(&page) {
            Some(i) => *i,
            None => return Err(Error::PageNotFound(page)),
        };
        let media_box = self
            .get_inherited_attr(b"MediaBox", page_id)?
            .as_array()?
            .clone();
        if media_box.len() != 4 {
            return Err(Error::Pdf(lopdf::Error::Syntax(format!(
                "Expected MediaBox to have 4 elements, actually had {}",
                media_box.len()
            ))));
        }

        let media_box = media_box
            .iter()
            .map(|c| c.as_f64().ok().or(c.as_i64().ok().map(|i| i as f64)))
            .collect::<Option<Vec<_>>>()
            .ok_or(Error::Pdf(lopdf::Error::Syntax(
                "Invalid floating point value".to_string(),
            )))?;

        let c1 = (media_box[0], media_box[1]);
        let c2 = (media_box[2], media_box[3]);

        Ok(BoundingBox {
            ll: (c1.0.min(c2.0), c1.1.min(c2.1)),
            ur: (c1.0.max(c2.0), c1.1.max(c2.1)),
        })
    }

    fn get_inherited_attr(&self, key: &[u8], page_id: lopdf::ObjectId) -> Result<&lopdf::Object, Error> {
        fn get_key<'a>(
            key: &[u8],
            page_node: &'a lopdf::Dictionary,
            doc: &'a lopdf::Document,
        ) -> Result<&'a lopdf::Object, lopdf::Error> {
            if let Ok(obj) = page_node.get(key) {
                Ok(obj)
            } else {
                let page_tree = page_node
                    .get(b"Parent")
                    .and_then(lopdf::Object::as_reference)
                    .and_then(|id| doc.get_dictionary(id))?;
                get_key(key, page_tree, doc)
            }
        }

        let page = self.inner.get_dictionary(page_id)?;
        Ok(get_key(key, page, &self.inner)?)
    }

    fn standard_font_id(&mut self, base_font: &'static str) -> lopdf::ObjectId {
        match self.font_ids.get(base_font) {
            Some(f) => *f,
            None => {
                let font_id = self.inner.add_object(dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => base_font,
                });
                self.font_ids.insert(base_font, font_id);
                font_id
            }
        }
    }

    /// Decode a PNG and embed it as an image XObject, splitting any
    /// alpha channel out into an SMask.
    pub fn png_to_xobj(&mut self, data: &[u8]) -> Result<lopdf::ObjectId, Error> {
        let img = png::Decoder::new(data);
        let mut img_reader = img.read_info()?;
        let mut img_buf = vec![0; img_reader.output_buffer_size()];
        let img_data = img_reader.next_frame(&mut img_buf)?;
        let img_bytes = &img_buf[..img_data.buffer_size()];

        let unsupported = || Error::Pdf(lopdf::Error::IO(std::io::ErrorKind::Unsupported.into()));

        let (img_bytes, color_space, bits_per_component, mask_bytes) =
            match (img_data.bit_depth, img_data.color_type) {
                (png::BitDepth::One, png::ColorType::Grayscale) => (img_bytes.to_vec(), "DeviceGray", 1, None),
                (png::BitDepth::Two, png::ColorType::Grayscale) => (img_bytes.to_vec(), "DeviceGray", 2, None),
                (png::BitDepth::Four, png::ColorType::Grayscale) => (img_bytes.to_vec(), "DeviceGray", 4, None),
                (png::BitDepth::Eight, png::ColorType::Grayscale) => (img_bytes.to_vec(), "DeviceGray", 8, None),
                (png::BitDepth::Eight, png::ColorType::Rgb) => (img_bytes.to_vec(), "DeviceRGB", 8, None),
                (png::BitDepth::Eight, png::ColorType::GrayscaleAlpha) => {
                    let mut gray_bytes = Vec::with_capacity(img_bytes.len() / 2);
                    let mut alpha_bytes = Vec::with_capacity(img_bytes.len() / 2);
                    for (i, byte) in img_bytes.iter().enumerate() {
                        if i % 2 == 0 {
                            gray_bytes.push(*byte);
                        } else {
                            alpha_bytes.push(*byte);
                        }
                    }
                    (gray_bytes, "DeviceGray", 8, Some(alpha_bytes))
                }
                (png::BitDepth::Eight, png::ColorType::Rgba) => {
                    let mut rgb_bytes = Vec::with_capacity((img_bytes.len() / 4) * 3);
                    let mut alpha_bytes = Vec::with_capacity(img_bytes.len() / 4);
                    for (i, byte) in img_bytes.iter().enumerate() {
                        if i % 4 == 3 {
                            alpha_bytes.push(*byte);
                        } else {
                            rgb_bytes.push(*byte);
                        }
                    }
                    (rgb_bytes, "DeviceRGB", 8, Some(alpha_bytes))
                }
                _ => return Err(unsupported()),
            };

        let mask_obj_id = match mask_bytes {
            Some(mask_bytes) => {
                let mask_data = Self::zlib_hex_encode(&mask_bytes)?;
                Some(self.inner.add_object(
                    lopdf::Stream::new(
                        dictionary! {
                            "Type" => "XObject",
                            "Subtype" => "Image",
                            "ColorSpace" => "DeviceGray",
                            "Width" => lopdf::Object::Integer(img_data.width.into()),
                            "Height" => lopdf::Object::Integer(img_data.height.into()),
                            "BitsPerComponent" => lopdf::Object::Integer(8),
                            "Filter" => lopdf::Object::Array(vec!["ASCIIHexDecode".into(), "FlateDecode".into()])
                        },
                        mask_data.into(),
                    )
                    .with_compression(false),
                ))
            }
            None => None,
        };

        let img_hex_data = Self::zlib_hex_encode(&img_bytes)?;
        let mut img_dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "ColorSpace" => color_space,
            "Width" => lopdf::Object::Integer(img_data.width.into()),
            "Height" => lopdf::Object::Integer(img_data.height.into()),
            "BitsPerComponent" => lopdf::Object::Integer(bits_per_component),
            "Filter" => lopdf::Object::Array(vec!["ASCIIHexDecode".into(), "FlateDecode".into()])
        };
        if let Some(mask_obj_id) = mask_obj_id {
            img_dict.set("SMask", lopdf::Object::Reference(mask_obj_id));
        }

        Ok(self
            .inner
            .add_object(lopdf::Stream::new(img_dict, img_hex_data.into()).with_compression(false)))
    }

    fn zlib_hex_encode(bytes: &[u8]) -> Result<String, Error> {
        let mut encoder = deflate::write::ZlibEncoder::new(Vec::new(), deflate::Compression::Default);
        encoder
            .write_all(bytes)
            .map_err(|e| Error::Pdf(lopdf::Error::IO(e)))?;
        let compressed = encoder
            .finish()
            .map_err(|e| Error::Pdf(lopdf::Error::IO(e)))?;
        let mut hex_data = hex::encode(&compressed);
        hex_data.push('>');
        Ok(hex_data)
    }

    /// Resources, Resources/Font and Resources/XObject may each be
    /// inline or an indirect reference; return the target dictionary
    /// either way.
    fn resource_category_mut(
        &mut self,
        page_id: lopdf::ObjectId,
        key: &[u8],
    ) -> Result<&mut lopdf::Dictionary, Error> {
        let resources_ref = {
            let page = self.inner.get_object_mut(page_id)?.as_dict_mut()?;
            if !page.has(b"Resources") {
                page.set("Resources", lopdf::Dictionary::new());
            }
            page.get(b"Resources")?.as_reference().ok()
        };

        let category_ref = {
            let resources = match resources_ref {
                Some(r) => self.inner.get_object_mut(r)?.as_dict_mut()?,
                None => self
                    .inner
                    .get_object_mut(page_id)?
                    .as_dict_mut()?
                    .get_mut(b"Resources")?
                    .as_dict_mut()?,
            };
            if !resources.has(key) {
                resources.set(key.to_vec(), lopdf::Dictionary::new());
            }
            resources.get(key)?.as_reference().ok()
        };

        let dict = match (category_ref, resources_ref) {
            (Some(r), _) => self.inner.get_object_mut(r)?.as_dict_mut()?,
            (None, Some(r)) => self
                .inner
                .get_object_mut(r)?
                .as_dict_mut()?
                .get_mut(key)?
                .as_dict_mut()?,
            (None, None) => self
                .inner
                .get_object_mut(page_id)?
                .as_dict_mut()?
                .get_mut(b"Resources")?
                .as_dict_mut()?
                .get_mut(key)?
                .as_dict_mut()?,
        };
        Ok(dict)
    }
}

impl DocumentPage<'_> {
    pub fn width(&self) -> f64 {
        self.media_box.ur.0 - self.media_box.ll.0
    }

    pub fn height(&self) -> f64 {
        self.media_box.ur.1 - self.media_box.ll.1
    }

    fn place(&self, x: f64, y: f64, w: f64, h: f64) -> PdfSpacePos {
        PdfSpacePos {
            x: self.media_box.ll.0 + x,
            y: self.media_box.ll.1 + geometry::pdf_space_y(self.height(), y, h),
            w,
            h,
        }
    }

    fn use_font(&mut self, font: (&'static str, &'static str)) {
        if !self.fonts.contains(&font) {
            self.fonts.push(font);
        }
    }

    /// Draw a string left-aligned and vertically centred in the box.
    pub fn add_text(&mut self, text: &str, x: f64, y: f64, w: f64, h: f64, max_font_size: f64) {
        let pos = self.place(x, y, w, h);
        let size = max_font_size.min(pos.h * 0.6);
        // Td addresses the baseline; cap height is roughly 0.7 em.
        let baseline = pos.y + pos.h / 2.0 - size * 0.35;
        self.use_font(HELVETICA);

        self.ops.extend(vec![
            lopdf::content::Operation::new("BT", vec![]),
            lopdf::content::Operation::new("Tf", vec![HELVETICA.0.into(), size.into()]),
            lopdf::content::Operation::new("Td", vec![(pos.x + 2.0).into(), baseline.into()]),
            lopdf::content::Operation::new("Tj", vec![lopdf::Object::string_literal(text)]),
            lopdf::content::Operation::new("ET", vec![]),
        ]);
    }

    /// Draw a check glyph sized to the box.
    pub fn add_checkmark(&mut self, x: f64, y: f64, w: f64, h: f64) {
        let pos = self.place(x, y, w, h);
        let size = (pos.w.min(pos.h) * 0.8).max(1.0);
        let baseline = pos.y + pos.h / 2.0 - size * 0.35;
        self.use_font(DINGBATS);

        self.ops.extend(vec![
            lopdf::content::Operation::new("BT", vec![]),
            lopdf::content::Operation::new("Tf", vec![DINGBATS.0.into(), size.into()]),
            lopdf::content::Operation::new(
                "Td",
                vec![(pos.x + (pos.w - size) / 2.0).into(), baseline.into()],
            ),
            lopdf::content::Operation::new("Tj", vec![lopdf::Object::string_literal(CHECK_GLYPH)]),
            lopdf::content::Operation::new("ET", vec![]),
        ]);
    }

    /// Draw a PNG scaled exactly to the box.
    pub fn add_png_image(&mut self, data: &[u8], x: f64, y: f64, w: f64, h: f64) -> Result<(), Error> {
        let pos = self.place(x, y, w, h);
        let img_obj_id = self.doc.png_to_xobj(data)?;
        let img_name = format!("X{}", uuid::Uuid::new_v4().to_simple());
        self.xobjects.push((img_name.clone(), img_obj_id));

        self.ops.extend(vec![
            lopdf::content::Operation::new("q", vec![]),
            lopdf::content::Operation::new(
                "cm",
                vec![
                    pos.w.into(),
                    0.into(),
                    0.into(),
                    pos.h.into(),
                    pos.x.into(),
                    pos.y.into(),
                ],
            ),
            lopdf::content::Operation::new("Do", vec![img_name.into()]),
            lopdf::content::Operation::new("Q", vec![]),
        ]);

        Ok(())
    }

    /// Encode the accumulated operations as a new content stream,
    /// append it to the page's `Contents`, and register the fonts and
    /// XObjects the operations refer to.
    pub fn finish(self) -> Result<(), Error> {
        if self.ops.is_empty() {
            return Ok(());
        }

        let content = lopdf::content::Content { operations: self.ops };
        let stream_id = self
            .doc
            .inner
            .add_object(lopdf::Stream::new(dictionary! {}, content.encode()?));

        {
            let page = self.doc.inner.get_object_mut(self.page_id)?.as_dict_mut()?;
            let new_contents = match page.remove(b"Contents") {
                Some(lopdf::Object::Reference(existing)) => lopdf::Object::Array(vec![
                    lopdf::Object::Reference(existing),
                    lopdf::Object::Reference(stream_id),
                ]),
                Some(lopdf::Object::Array(mut array)) => {
                    array.push(lopdf::Object::Reference(stream_id));
                    lopdf::Object::Array(array)
                }
                _ => lopdf::Object::Reference(stream_id),
            };
            page.set("Contents", new_contents);
        }

        for &(res_name, base_font) in &self.fonts {
            let font_id = self.doc.standard_font_id(base_font);
            let page_fonts = self.doc.resource_category_mut(self.page_id, b"Font")?;
            if !page_fonts.has(res_name.as_bytes()) {
                page_fonts.set(res_name, lopdf::Object::Reference(font_id));
            }
        }

        if !self.xobjects.is_empty() {
            let page_xobjects = self.doc.resource_category_mut(self.page_id, b"XObject")?;
            for (name, oid) in self.xobjects {
                page_xobjects.set(name, lopdf::Object::Reference(oid));
            }
        }

        Ok(())
    }
}
