//! Raster image → single-page PDF.
//!
//! The page is sized so that one pixel is one point, and the image fills
//! the page. Alpha and palette information is flattened to RGB first.

use crate::dispatch::Converter;
use crate::engines::pdfium::{engine_err, pdfium};
use crate::error::ConvertError;
use image::{DynamicImage, ImageReader};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Image to PDF conversion.
#[derive(Debug, Clone, Default)]
pub struct ImageToPdf {
    pdfium_lib: Option<PathBuf>,
}

impl ImageToPdf {
    pub fn new(pdfium_lib: Option<PathBuf>) -> Self {
        Self { pdfium_lib }
    }
}

/// Decode any supported format (sniffed from content, not extension) to RGB.
pub fn load_rgb(path: &Path) -> Result<DynamicImage, ConvertError> {
    let decode_err = |detail: String| ConvertError::ImageDecode {
        path: path.to_path_buf(),
        detail,
    };

    let image = ImageReader::open(path)
        .map_err(|e| ConvertError::Io {
            path: path.to_path_buf(),
            source: e,
        })?
        .with_guessed_format()
        .map_err(|e| decode_err(e.to_string()))?
        .decode()
        .map_err(|e| decode_err(e.to_string()))?;

    Ok(DynamicImage::ImageRgb8(image.to_rgb8()))
}

impl Converter for ImageToPdf {
    fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        let image = load_rgb(input)?;
        let (w, h) = (image.width() as f32, image.height() as f32);
        debug!("Placing {}x{} image from {}", w, h, input.display());

        let pdfium = pdfium(self.pdfium_lib.as_deref())?;
        let mut document = pdfium
            .create_new_pdf()
            .map_err(engine_err("create document"))?;
        let mut page = document
            .pages_mut()
            .create_page_at_end(PdfPagePaperSize::Custom(PdfPoints::new(w), PdfPoints::new(h)))
            .map_err(engine_err("create page"))?;

        page.objects_mut()
            .create_image_object(
                PdfPoints::new(0.0),
                PdfPoints::new(0.0),
                &image,
                Some(PdfPoints::new(w)),
                Some(PdfPoints::new(h)),
            )
            .map_err(engine_err("place image"))?;

        document
            .save_to_file(output)
            .map_err(engine_err("save document"))
    }
}
