//! Error types for the edgequake-convert library.
//!
//! Failures are split by the layer that produces them:
//!
//! * [`StorageError`]: a filesystem operation on a bucket failed.
//! * [`ConvertError`]: a converter (pdfium, pandoc, image codec) failed,
//!   or the configuration is invalid.
//! * [`DispatchError`]: the outcome of routing one upload to a converter:
//!   unsupported kind, converter failure, or missing output.
//! * [`HandleFailure`]: the request-boundary taxonomy. Its `Display` text
//!   is exactly what the HTTP client receives.
//! * [`ServerError`]: start-up failures of the HTTP server.
//!
//! Only [`ServerError`] and the storage start-up path are fatal. Everything
//! raised while handling a request ends up as a [`HandleFailure`], and the
//! sweeper logs its own [`StorageError`]s without propagating them.

use std::path::PathBuf;
use thiserror::Error;

/// Filesystem errors raised by [`crate::storage::Storage`].
#[derive(Debug, Error)]
pub enum StorageError {
    /// A bucket directory could not be created at start-up.
    #[error("Cannot create storage directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing an entry failed (disk full, permission denied, …).
    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading an entry failed for a reason other than it being absent.
    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The entry does not exist (never written, or already swept).
    #[error("Entry '{path}' does not exist")]
    NotFound { path: PathBuf },

    /// The bucket directory could not be enumerated.
    #[error("Failed to list '{path}': {source}")]
    List {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Removing an entry failed for a reason other than it being absent.
    #[error("Failed to delete '{path}': {source}")]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error (e.g. a blocking task panicked).
    #[error("Internal storage error: {0}")]
    Internal(String),
}

impl StorageError {
    /// `true` when the error means "the entry is gone", which callers treat
    /// as a normal transient condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Errors raised by a single converter run.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// pdfium could not open the input document.
    #[error("PDF '{path}' could not be opened: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// The PDF opened but has no pages.
    #[error("PDF '{path}' has no pages")]
    EmptyDocument { path: PathBuf },

    /// A text upload is not valid UTF-8.
    #[error("'{path}' is not valid UTF-8 text")]
    TextDecode { path: PathBuf },

    /// The image codec could not decode the upload.
    #[error("Cannot decode image '{path}': {detail}")]
    ImageDecode { path: PathBuf, detail: String },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// pdfium failed while building or rendering a document.
    #[error("PDF engine error: {0}")]
    Pdfium(String),

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    /// An external program is not installed or not on `PATH`.
    #[error("Required tool '{tool}' was not found. Is it installed?")]
    ToolMissing { tool: String },

    /// An external program ran but exited unsuccessfully.
    #[error("'{tool}' exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    /// The PNG encoder failed while writing the output image.
    #[error("Cannot encode image '{path}': {detail}")]
    ImageEncode { path: PathBuf, detail: String },

    /// Building the DOCX container failed.
    #[error("Failed to build DOCX '{path}': {detail}")]
    Docx { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Reading the input or writing the output file failed.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Outcome of a failed [`crate::dispatch::Dispatcher::dispatch`] call.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The kind is not in the vocabulary, or no converter is registered
    /// for it. This is an expected outcome, not a fault.
    #[error("Conversion type '{kind}' is not supported")]
    Unsupported { kind: String },

    /// The converter reported an error. No entry was registered.
    #[error("{kind} failed: {source}")]
    Failed {
        kind: String,
        #[source]
        source: ConvertError,
    },

    /// The converter reported success but wrote nothing.
    #[error("{kind} produced no output")]
    OutputMissing { kind: String },

    /// Staging or committing the output failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Request-boundary failure taxonomy.
///
/// The `Display` text is the plain-text body returned to the client.
#[derive(Debug, Error)]
pub enum HandleFailure {
    /// Unknown or unregistered conversion kind.
    #[error("Conversion type not supported.")]
    Unsupported,

    /// The converter raised an error.
    #[error("Conversion failed: {detail}")]
    ConversionFailed { detail: String },

    /// The converted entry is absent (never written, or swept already).
    #[error("Conversion failed. Please try again.")]
    OutputMissing,

    /// Storing the upload or reading the result failed.
    #[error("Error during conversion: {0}")]
    Storage(#[source] StorageError),

    /// The request itself was malformed (missing form field, bad multipart).
    #[error("Error during conversion: {0}")]
    InvalidUpload(String),
}

impl From<DispatchError> for HandleFailure {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::Unsupported { .. } => HandleFailure::Unsupported,
            DispatchError::Failed { source, .. } => HandleFailure::ConversionFailed {
                detail: source.to_string(),
            },
            DispatchError::OutputMissing { .. } => HandleFailure::OutputMissing,
            DispatchError::Storage(s) if s.is_not_found() => HandleFailure::OutputMissing,
            DispatchError::Storage(s) => HandleFailure::Storage(s),
        }
    }
}

impl From<StorageError> for HandleFailure {
    fn from(e: StorageError) -> Self {
        if e.is_not_found() {
            HandleFailure::OutputMissing
        } else {
            HandleFailure::Storage(e)
        }
    }
}

/// Fatal server start-up errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The storage directories could not be prepared.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The listening socket could not be bound.
    #[error("Cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The HTTP server loop failed.
    #[error("HTTP server error: {0}")]
    Serve(#[source] std::io::Error),
}
