//! pdfium binding shared by every PDF engine.
//!
//! `pdfium-render` wraps the pdfium C++ library, loaded at runtime. The
//! library is bound once per process and reused; the `thread_safe` feature
//! serialises access so the instance can be shared by the blocking pool.
//!
//! Library resolution (first match wins):
//! 1. the configured path (`PDFIUM_LIB_PATH`), a file or a directory;
//! 2. the platform library name in the working directory;
//! 3. the system library.

use crate::error::ConvertError;
use once_cell::sync::OnceCell;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

static PDFIUM: OnceCell<Pdfium> = OnceCell::new();

/// Return the process-wide pdfium instance, binding it on first use.
///
/// A failed bind is not cached; the next call tries again.
pub fn pdfium(lib_path: Option<&Path>) -> Result<&'static Pdfium, ConvertError> {
    init_once(&PDFIUM, || bind(lib_path))
}

/// Run `init` at most once per successful initialisation of `cell`.
///
/// Concurrent first callers block until the winner finishes, so only one
/// instance is ever constructed. Dropping a second `Pdfium` would call
/// `FPDF_DestroyLibrary` under the cached one.
fn init_once<T>(
    cell: &OnceCell<T>,
    init: impl FnOnce() -> Result<T, ConvertError>,
) -> Result<&T, ConvertError> {
    cell.get_or_try_init(init)
}

fn bind(lib_path: Option<&Path>) -> Result<Pdfium, ConvertError> {
    let bindings = match lib_path {
        Some(p) => {
            let file = library_file(p);
            info!("Binding pdfium from {}", file.display());
            Pdfium::bind_to_library(&file)
        }
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| {
                debug!("No pdfium in working directory, trying system library");
                Pdfium::bind_to_system_library()
            }),
    }
    .map_err(|e| ConvertError::PdfiumBindingFailed(format!("{e:?}")))?;

    Ok(Pdfium::new(bindings))
}

/// Accept either the library file itself or the directory holding it.
fn library_file(p: &Path) -> PathBuf {
    if p.is_dir() {
        PathBuf::from(Pdfium::pdfium_platform_library_name_at_path(p))
    } else {
        p.to_path_buf()
    }
}

/// Open a PDF, mapping pdfium's error into [`ConvertError::CorruptPdf`].
pub fn open_pdf<'a>(pdfium: &'a Pdfium, path: &Path) -> Result<PdfDocument<'a>, ConvertError> {
    pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| ConvertError::CorruptPdf {
            path: path.to_path_buf(),
            detail: format!("{e:?}"),
        })
}

/// Map any other pdfium failure.
pub(crate) fn engine_err(context: &str) -> impl Fn(PdfiumError) -> ConvertError + '_ {
    move |e| ConvertError::Pdfium(format!("{context}: {e:?}"))
}
