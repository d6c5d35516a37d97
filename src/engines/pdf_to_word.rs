//! PDF → DOCX: extract the text layer with pdfium and wrap it in a DOCX.
//!
//! Only text survives. Layout, fonts and images are dropped, and scanned
//! PDFs without a text layer produce an empty document.

use crate::dispatch::Converter;
use crate::engines::docx::write_docx;
use crate::engines::pdfium::{engine_err, open_pdf, pdfium};
use crate::error::ConvertError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Text-only PDF to Word conversion.
#[derive(Debug, Clone, Default)]
pub struct PdfToWord {
    pdfium_lib: Option<PathBuf>,
}

impl PdfToWord {
    pub fn new(pdfium_lib: Option<PathBuf>) -> Self {
        Self { pdfium_lib }
    }
}

impl Converter for PdfToWord {
    fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        let pdfium = pdfium(self.pdfium_lib.as_deref())?;
        let document = open_pdf(pdfium, input)?;

        let mut pages_text = Vec::new();
        for page in document.pages().iter() {
            let text = page.text().map_err(engine_err("text extraction"))?;
            pages_text.push(text.all());
        }
        debug!(
            "Extracted text from {} pages of {}",
            pages_text.len(),
            input.display()
        );

        write_docx(output, &pages_text.join("\n"))
    }
}
