//! PDF → PNG of the first page.
//!
//! Only page 1 is rendered; the rest of the document is ignored. Scale is
//! `dpi / 72` (PDF user space is 72 units per inch), with both dimensions
//! capped so a poster-sized page cannot exhaust memory.

use crate::dispatch::Converter;
use crate::engines::pdfium::{engine_err, open_pdf, pdfium};
use crate::error::ConvertError;
use image::ImageFormat;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// First-page rasteriser.
#[derive(Debug, Clone)]
pub struct PdfToImage {
    dpi: u32,
    max_pixels: u32,
    pdfium_lib: Option<PathBuf>,
}

impl PdfToImage {
    pub fn new(dpi: u32, max_pixels: u32, pdfium_lib: Option<PathBuf>) -> Self {
        Self {
            dpi,
            max_pixels,
            pdfium_lib,
        }
    }

    fn render_config(&self) -> PdfRenderConfig {
        let cap = pixel_cap(self.max_pixels);
        PdfRenderConfig::new()
            .scale_page_by_factor(scale_for_dpi(self.dpi))
            .set_maximum_width(cap)
            .set_maximum_height(cap)
    }
}

impl Default for PdfToImage {
    fn default() -> Self {
        Self::new(200, 4000, None)
    }
}

fn scale_for_dpi(dpi: u32) -> f32 {
    dpi as f32 / 72.0
}

impl Converter for PdfToImage {
    fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        let pdfium = pdfium(self.pdfium_lib.as_deref())?;
        let document = open_pdf(pdfium, input)?;
        let pages = document.pages();

        if pages.len() == 0 {
            return Err(ConvertError::EmptyDocument {
                path: input.to_path_buf(),
            });
        }
        if pages.len() > 1 {
            info!(
                "{} has {} pages, rendering page 1 only",
                input.display(),
                pages.len()
            );
        }

        let page = pages.first().map_err(engine_err("first page"))?;
        let bitmap = page
            .render_with_config(&self.render_config())
            .map_err(engine_err("render page 1"))?;
        let image = bitmap.as_image();
        debug!("Rendered page 1 → {}x{} px", image.width(), image.height());

        image
            .save_with_format(output, ImageFormat::Png)
            .map_err(|e| ConvertError::ImageEncode {
                path: output.to_path_buf(),
                detail: e.to_string(),
            })
    }
}

/// pdfium takes signed dimensions; saturate instead of wrapping negative.
fn pixel_cap(max_pixels: u32) -> i32 {
    i32::try_from(max_pixels).unwrap_or(i32::MAX)
}
