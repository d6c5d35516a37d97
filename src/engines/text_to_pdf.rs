//! Plain text → PDF.
//!
//! Layout is computed first as a pure function ([`layout_lines`]) and then
//! drawn with pdfium's built-in Helvetica. Lines are trimmed and truncated,
//! never wrapped; blank lines take no vertical space.

use crate::config::TextLayout;
use crate::dispatch::Converter;
use crate::engines::pdfium::{engine_err, pdfium};
use crate::error::ConvertError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One line of text at its baseline position.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub x: f32,
    pub y: f32,
    pub text: String,
}

/// Split `text` into pages of positioned lines.
///
/// Always returns at least one page; input with no printable lines gives a
/// single empty page.
pub fn layout_lines(text: &str, layout: &TextLayout) -> Vec<Vec<PlacedLine>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut pages = vec![Vec::new()];
    let mut y = layout.top;

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if y < layout.bottom {
            pages.push(Vec::new());
            y = layout.top;
        }
        let truncated: String = line.chars().take(layout.max_chars).collect();
        // `pages` is never empty.
        if let Some(page) = pages.last_mut() {
            page.push(PlacedLine {
                x: layout.left,
                y,
                text: truncated,
            });
        }
        y -= layout.line_height;
    }

    pages
}

/// Text to PDF conversion.
#[derive(Debug, Clone, Default)]
pub struct TextToPdf {
    layout: TextLayout,
    pdfium_lib: Option<PathBuf>,
}

impl TextToPdf {
    pub fn new(layout: TextLayout, pdfium_lib: Option<PathBuf>) -> Self {
        Self { layout, pdfium_lib }
    }
}

impl Converter for TextToPdf {
    fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        let bytes = std::fs::read(input).map_err(|e| ConvertError::Io {
            path: input.to_path_buf(),
            source: e,
        })?;
        let text = String::from_utf8(bytes).map_err(|_| ConvertError::TextDecode {
            path: input.to_path_buf(),
        })?;

        let pages = layout_lines(&text, &self.layout);
        debug!("Laid out {} into {} pages", input.display(), pages.len());

        let pdfium = pdfium(self.pdfium_lib.as_deref())?;
        let mut document = pdfium
            .create_new_pdf()
            .map_err(engine_err("create document"))?;
        let font = document.fonts_mut().helvetica();
        let size = PdfPagePaperSize::Custom(
            PdfPoints::new(self.layout.page_width),
            PdfPoints::new(self.layout.page_height),
        );

        for lines in &pages {
            let mut page = document
                .pages_mut()
                .create_page_at_end(size)
                .map_err(engine_err("create page"))?;
            for line in lines {
                page.objects_mut()
                    .create_text_object(
                        PdfPoints::new(line.x),
                        PdfPoints::new(line.y),
                        &line.text,
                        font,
                        PdfPoints::new(self.layout.font_size),
                    )
                    .map_err(engine_err("draw text"))?;
            }
        }

        document
            .save_to_file(output)
            .map_err(engine_err("save document"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(page: &[PlacedLine]) -> Vec<&str> {
        page.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn blank_lines_are_skipped_and_lines_trimmed() {
        let pages = layout_lines("  first  \n\n   \r\nsecond\r\n", &TextLayout::default());
        assert_eq!(pages.len(), 1);
        assert_eq!(texts(&pages[0]), vec!["first", "second"]);
        assert_eq!(pages[0][0].y, 800.0);
        assert_eq!(pages[0][1].y, 780.0);
        assert!(pages[0].iter().all(|l| l.x == 50.0));
    }

    #[test]
    fn long_lines_are_truncated_not_wrapped() {
        let line = "x".repeat(200);
        let pages = layout_lines(&line, &TextLayout::default());
        assert_eq!(pages[0].len(), 1);
        assert_eq!(pages[0][0].text.chars().count(), 80);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let line = "é".repeat(100);
        let pages = layout_lines(&line, &TextLayout::default());
        assert_eq!(pages[0][0].text, "é".repeat(80));
    }

    #[test]
    fn default_layout_fits_38_lines_per_page() {
        let text: String = (1..=77).map(|i| format!("line {i}\n")).collect();
        let pages = layout_lines(&text, &TextLayout::default());
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].len(), 38);
        assert_eq!(pages[1].len(), 38);
        assert_eq!(pages[2].len(), 1);
        assert_eq!(pages[0].last().unwrap().y, 60.0);
        assert_eq!(pages[1][0].text, "line 39");
        assert_eq!(pages[1][0].y, 800.0);
    }

    #[test]
    fn exact_page_multiple_has_no_trailing_blank_page() {
        let text: String = (1..=38).map(|i| format!("{i}\n")).collect();
        assert_eq!(layout_lines(&text, &TextLayout::default()).len(), 1);
    }

    #[test]
    fn empty_input_gives_one_empty_page() {
        let pages = layout_lines("\n \n\t\n", &TextLayout::default());
        assert_eq!(pages.len(), 1);
        assert!(pages[0].is_empty());
    }

    #[test]
    fn byte_order_mark_is_dropped() {
        let pages = layout_lines("\u{feff}hello", &TextLayout::default());
        assert_eq!(texts(&pages[0]), vec!["hello"]);
    }

    #[test]
    fn invalid_utf8_is_a_decode_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let input = tmp.path().join("bad.txt");
        std::fs::write(&input, [0xff, 0xfe, 0x00, 0xc3]).unwrap();
        let err = TextToPdf::default()
            .convert(&input, &tmp.path().join("out.pdf"))
            .unwrap_err();
        assert!(matches!(err, ConvertError::TextDecode { .. }), "got: {err:?}");
    }
}
