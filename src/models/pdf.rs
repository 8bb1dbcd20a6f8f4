//! Lossless JPEG to PDF embedding.
//!
//! Each JPEG is copied verbatim into an image XObject with the `DCTDecode`
//! filter, so the pixel data is never decoded or recompressed. One image per
//! page, the page sized to the image at [`DEFAULT_DPI`].

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;

pub const DEFAULT_DPI: f32 = 96.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Gray,
    Rgb,
}

impl ColorSpace {
    fn pdf_name(self) -> &'static str {
        match self {
            ColorSpace::Gray => "DeviceGray",
            ColorSpace::Rgb => "DeviceRGB",
        }
    }
}

/// One JPEG encoded page.
#[derive(Debug, Clone)]
pub struct PdfPage {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub color: ColorSpace,
}

pub struct PdfWriter {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
    dpi: f32,
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfWriter {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
            dpi: DEFAULT_DPI,
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Append `page` after every page added so far.
    pub fn add_page(&mut self, page: PdfPage) -> lopdf::Result<()> {
        let width_pt = page.width as f32 * 72.0 / self.dpi;
        let height_pt = page.height as f32 * 72.0 / self.dpi;

        let image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => page.width as i64,
                "Height" => page.height as i64,
                "ColorSpace" => page.color.pdf_name(),
                "BitsPerComponent" => 8_i64,
                "Filter" => "DCTDecode",
            },
            page.jpeg,
        )
        .with_compression(false);
        let image_id = self.doc.add_object(image);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        width_pt.into(),
                        0_i64.into(),
                        0_i64.into(),
                        height_pt.into(),
                        0_i64.into(),
                        0_i64.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = self
            .doc
            .add_object(Stream::new(dictionary! {}, content.encode()?));

        let media_box: Vec<Object> =
            vec![0_i64.into(), 0_i64.into(), width_pt.into(), height_pt.into()];
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => media_box,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "Im0" => image_id,
                },
            },
        });
        self.kids.push(page_id.into());
        Ok(())
    }

    /// Serialise the document into `target`.
    pub fn write_to<W: Write>(mut self, target: &mut W) -> lopdf::Result<()> {
        let count = self.kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => self.kids,
            "Count" => count,
        };
        self.doc.objects.insert(self.pages_id, Object::Dictionary(pages));
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.save_to(target)?;
        Ok(())
    }
}
