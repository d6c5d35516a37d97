//! # edgequake-convert
//!
//! Upload-and-convert web service for PDF, Word, text and image files.
//!
//! A client uploads one file together with a conversion kind and receives
//! the converted file in the same response. Uploads and results live in two
//! flat directories on local disk and are deleted automatically once they
//! are older than the age limit (60 s by default); nothing is kept per user
//! or per session.
//!
//! ## Request Flow
//!
//! ```text
//! POST /convert  (file + conversion)
//!  │
//!  ├─ 1. Handler     sanitise name, store in uploads/
//!  ├─ 2. Dispatcher  pick converter by kind (unknown → "not supported")
//!  ├─ 3. Engine      pdfium / pandoc / image, on the blocking pool
//!  ├─ 4. Commit      staged output renamed into converted/
//!  └─ 5. Response    attachment, or plain-text failure message
//!
//! Sweepers (one per bucket)
//!  └─ every 30 s: delete entries older than 60 s
//! ```
//!
//! ## Conversions
//!
//! | Kind           | Input        | Output | Backend          |
//! |----------------|--------------|--------|------------------|
//! | `pdf_to_word`  | PDF          | DOCX   | pdfium text      |
//! | `word_to_pdf`  | DOCX         | PDF    | `pandoc`         |
//! | `txt_to_pdf`   | UTF-8 text   | PDF    | pdfium           |
//! | `image_to_pdf` | PNG/JPEG/... | PDF    | `image` + pdfium |
//! | `pdf_to_image` | PDF (page 1) | PNG    | pdfium           |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_convert::{server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::builder().port(8080).build()?;
//!     server::run(config, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `edgequake-convert` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod dispatch;
pub mod engines;
pub mod error;
pub mod handler;
pub mod kind;
pub mod server;
pub mod storage;
pub mod sweeper;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ServerConfig, ServerConfigBuilder, TextLayout};
pub use dispatch::{Converter, Dispatcher};
pub use error::{ConvertError, DispatchError, HandleFailure, ServerError, StorageError};
pub use handler::Handler;
pub use kind::ConversionKind;
pub use storage::{Bucket, EntryInfo, EntryRef, Storage};
pub use sweeper::{SweepReport, Sweeper, SweeperSet};
