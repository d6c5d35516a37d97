//! The conversion-kind vocabulary and the output naming rule.
//!
//! The identifiers are an external contract shared with HTML forms and API
//! clients and must not change.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A supported conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionKind {
    /// PDF text → DOCX.
    PdfToWord,
    /// DOCX → PDF via pandoc.
    WordToPdf,
    /// Plain text → PDF.
    #[serde(rename = "txt_to_pdf")]
    TextToPdf,
    /// Raster image → single-page PDF.
    ImageToPdf,
    /// First page of a PDF → PNG.
    PdfToImage,
}

impl ConversionKind {
    pub const ALL: [ConversionKind; 5] = [
        ConversionKind::PdfToWord,
        ConversionKind::WordToPdf,
        ConversionKind::TextToPdf,
        ConversionKind::ImageToPdf,
        ConversionKind::PdfToImage,
    ];

    /// Wire identifier, e.g. `"txt_to_pdf"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionKind::PdfToWord => "pdf_to_word",
            ConversionKind::WordToPdf => "word_to_pdf",
            ConversionKind::TextToPdf => "txt_to_pdf",
            ConversionKind::ImageToPdf => "image_to_pdf",
            ConversionKind::PdfToImage => "pdf_to_image",
        }
    }

    /// Human-readable label for the upload form.
    pub fn label(&self) -> &'static str {
        match self {
            ConversionKind::PdfToWord => "PDF to Word",
            ConversionKind::WordToPdf => "Word to PDF",
            ConversionKind::TextToPdf => "Text to PDF",
            ConversionKind::ImageToPdf => "Image to PDF",
            ConversionKind::PdfToImage => "PDF to Image (first page)",
        }
    }

    /// Extension of the produced file, without the dot.
    pub fn target_extension(&self) -> &'static str {
        match self {
            ConversionKind::PdfToWord => "docx",
            ConversionKind::WordToPdf
            | ConversionKind::TextToPdf
            | ConversionKind::ImageToPdf => "pdf",
            ConversionKind::PdfToImage => "png",
        }
    }

    /// Name of the converted entry for an upload called `input_name`.
    pub fn output_name(&self, input_name: &str) -> String {
        replace_extension(input_name, self.target_extension())
    }
}

impl fmt::Display for ConversionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an identifier outside the vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown conversion kind '{0}'")]
pub struct UnknownKind(pub String);

impl FromStr for ConversionKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConversionKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// Replace whatever follows the last `.` with `ext`.
///
/// A name without an extension (including dot-files such as `.env`) gets
/// `.ext` appended instead.
pub fn replace_extension(name: &str, ext: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => format!("{stem}.{ext}"),
        _ => format!("{name}.{ext}"),
    }
}
