use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::retriever::RetrievedPage;

/// Resolution assumed for page images when sizing PDF pages.
pub const DEFAULT_DPI: f32 = 96.0;

const IMAGE_NAME: &str = "Im0";

/// Turns an ordered sequence of page images into one document.
pub trait DocumentAssembler {
    fn assemble(&self, pages: &[RetrievedPage]) -> Result<Vec<u8>>;
}

/// Builds a PDF with one image per page, in the order given.
#[derive(Debug, Clone, Copy)]
pub struct PdfAssembler {
    dpi: f32,
}

impl PdfAssembler {
    pub fn new() -> Self {
        Self { dpi: DEFAULT_DPI }
    }

    pub fn with_dpi(dpi: f32) -> Result<Self> {
        if !dpi.is_finite() || dpi <= 0.0 {
            return Err(Error::Config(format!(
                "page resolution must be a positive DPI (got {dpi})"
            )));
        }
        Ok(Self { dpi })
    }

    fn points(&self, pixels: u32) -> f32 {
        pixels as f32 * 72.0 / self.dpi
    }

    fn add_page(
        &self,
        doc: &mut Document,
        pages_id: ObjectId,
        page: &RetrievedPage,
    ) -> Result<ObjectId> {
        let image = image::load_from_memory(&page.data)
            .map_err(|source| Error::Image {
                page: page.index,
                source,
            })?
            .to_rgb8();
        let (width, height) = image.dimensions();

        // The document never holds a page's raw RGB, only its deflated form.
        let mut stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(width),
                "Height" => i64::from(height),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            image.into_raw(),
        );
        stream
            .compress()
            .map_err(|e| Error::Pdf(format!("page {}: {}", page.index, e)))?;
        let image_id = doc.add_object(stream);

        let (w, h) = (self.points(width), self.points(height));
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![w.into(), 0.into(), 0.into(), h.into(), 0.into(), 0.into()],
                ),
                Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content = content
            .encode()
            .map_err(|e| Error::Pdf(format!("page {}: {}", page.index, e)))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), w.into(), h.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { IMAGE_NAME => image_id },
            },
        });

        debug!(page = page.index, width, height, "added page image");
        Ok(page_id)
    }
}

impl Default for PdfAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentAssembler for PdfAssembler {
    fn assemble(&self, pages: &[RetrievedPage]) -> Result<Vec<u8>> {
        if pages.is_empty() {
            return Err(Error::Pdf("no pages to assemble".to_string()));
        }

        info!("Merging {} pages to PDF...", pages.len());

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids = Vec::with_capacity(pages.len());
        for page in pages {
            kids.push(Object::Reference(self.add_page(&mut doc, pages_id, page)?));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.compress();

        let mut data = Vec::new();
        doc.save_to(&mut data)
            .map_err(|e| Error::Pdf(format!("failed to serialize PDF: {e}")))?;

        debug!(bytes = data.len(), "serialized PDF");
        Ok(data)
    }
}
