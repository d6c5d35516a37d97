//! Converter implementations, one per conversion kind.
//!
//! Each engine reads an input path and writes an output path; none of them
//! know about buckets or naming. They are blocking and are driven from
//! `spawn_blocking` by [`crate::dispatch::Dispatcher`].
//!
//! | Kind           | Engine                  | Backend           |
//! |----------------|-------------------------|-------------------|
//! | `pdf_to_word`  | [`PdfToWord`]           | pdfium + [`docx`] |
//! | `word_to_pdf`  | [`Pandoc`]              | `pandoc` process  |
//! | `txt_to_pdf`   | [`TextToPdf`]           | pdfium            |
//! | `image_to_pdf` | [`ImageToPdf`]          | `image` + pdfium  |
//! | `pdf_to_image` | [`PdfToImage`]          | pdfium + `image`  |

pub mod docx;
pub mod image_to_pdf;
pub mod pdf_to_image;
pub mod pdf_to_word;
pub mod pdfium;
pub mod text_to_pdf;
pub mod word_to_pdf;

pub use image_to_pdf::ImageToPdf;
pub use pdf_to_image::PdfToImage;
pub use pdf_to_word::PdfToWord;
pub use text_to_pdf::TextToPdf;
pub use word_to_pdf::Pandoc;
