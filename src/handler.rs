//! Request handler: one upload in, one converted entry (or a failure) out.
//!
//! The handler is transport-agnostic. The HTTP layer hands it the uploaded
//! file name, bytes and kind identifier, and turns the result into a
//! response. Inputs are left in place after conversion; the sweeper removes
//! them together with the outputs.

use crate::dispatch::Dispatcher;
use crate::error::HandleFailure;
use crate::storage::{Bucket, EntryRef, Storage};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, info};

static RE_UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9._ -]").unwrap());

/// Fallback for uploads whose name sanitises to nothing.
pub const DEFAULT_UPLOAD_NAME: &str = "upload";

/// Reduce a client-supplied file name to a flat, portable entry name.
///
/// Directory components are discarded, characters outside
/// `[A-Za-z0-9._ -]` become `_`, and leading dots are removed so the entry
/// can never be hidden or address a parent directory.
pub fn sanitize_upload_name(raw: &str) -> String {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let replaced = RE_UNSAFE_CHARS.replace_all(last, "_");
    let trimmed = replaced.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        DEFAULT_UPLOAD_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Upload → store → dispatch → confirm.
#[derive(Clone)]
pub struct Handler {
    storage: Storage,
    dispatcher: Arc<Dispatcher>,
}

impl Handler {
    pub fn new(storage: Storage, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            storage,
            dispatcher,
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Store the upload and convert it according to `kind`.
    ///
    /// On success the returned entry existed in the Converted bucket when
    /// this call checked; it can still expire before it is read.
    pub async fn handle(
        &self,
        uploaded_name: &str,
        bytes: Vec<u8>,
        kind: &str,
    ) -> Result<EntryRef, HandleFailure> {
        let name = sanitize_upload_name(uploaded_name);
        if name != uploaded_name {
            debug!("Upload name {:?} stored as {:?}", uploaded_name, name);
        }
        info!("Received {} ({} bytes) for {}", name, bytes.len(), kind);

        let input = self.storage.put(Bucket::Incoming, &name, bytes).await?;
        let output = self.dispatcher.dispatch(kind, &input).await?;

        if !self.storage.exists(Bucket::Converted, &output.name).await {
            return Err(HandleFailure::OutputMissing);
        }
        Ok(output)
    }

    /// Read a converted entry's bytes. An entry that has expired in the
    /// meantime is reported as [`HandleFailure::OutputMissing`].
    pub async fn fetch(&self, entry: &EntryRef) -> Result<Vec<u8>, HandleFailure> {
        Ok(self.storage.read(entry).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConvertError;
    use crate::kind::ConversionKind;
    use std::path::Path;
    use tempfile::TempDir;

    fn handler(tmp: &TempDir, build: impl FnOnce(Dispatcher) -> Dispatcher) -> Handler {
        let storage =
            Storage::open(tmp.path().join("uploads"), tmp.path().join("converted")).unwrap();
        let dispatcher = build(Dispatcher::new(storage.clone()));
        Handler::new(storage, Arc::new(dispatcher))
    }

    fn upper(input: &Path, output: &Path) -> Result<(), ConvertError> {
        let text = std::fs::read_to_string(input).unwrap();
        std::fs::write(output, text.to_uppercase()).unwrap();
        Ok(())
    }

    #[test]
    fn sanitising_flattens_and_cleans_names() {
        assert_eq!(sanitize_upload_name("report.txt"), "report.txt");
        assert_eq!(sanitize_upload_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_upload_name(r"C:\Users\me\My Doc.docx"), "My Doc.docx");
        assert_eq!(sanitize_upload_name("rés umé?.pdf"), "r_s um__.pdf");
        assert_eq!(sanitize_upload_name(".bashrc"), "bashrc");
        assert_eq!(sanitize_upload_name(".."), DEFAULT_UPLOAD_NAME);
        assert_eq!(sanitize_upload_name(""), DEFAULT_UPLOAD_NAME);
        assert_eq!(sanitize_upload_name("dir/"), DEFAULT_UPLOAD_NAME);
    }

    #[tokio::test]
    async fn successful_request_returns_converted_entry() {
        let tmp = TempDir::new().unwrap();
        let h = handler(&tmp, |d| d.with(ConversionKind::TextToPdf, upper));

        let out = h.handle("notes.txt", b"hello".to_vec(), "txt_to_pdf").await.unwrap();
        assert_eq!(out.name, "notes.pdf");
        assert_eq!(h.fetch(&out).await.unwrap(), b"HELLO");
        assert!(h.storage().exists(Bucket::Incoming, "notes.txt").await);
    }

    #[tokio::test]
    async fn unsupported_kind_keeps_upload_and_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let h = handler(&tmp, |d| d);

        let err = h.handle("a.txt", b"x".to_vec(), "txt_to_mp3").await.unwrap_err();
        assert_eq!(err.to_string(), "Conversion type not supported.");
        assert!(h.storage().exists(Bucket::Incoming, "a.txt").await);
        assert!(!h.storage().exists(Bucket::Converted, "a.mp3").await);
    }

    #[tokio::test]
    async fn converter_error_becomes_conversion_failed() {
        let tmp = TempDir::new().unwrap();
        let h = handler(&tmp, |d| {
            d.with(
                ConversionKind::PdfToWord,
                |input: &Path, _: &Path| -> Result<(), ConvertError> {
                    Err(ConvertError::CorruptPdf {
                        path: input.to_path_buf(),
                        detail: "no header".into(),
                    })
                },
            )
        });

        let err = h.handle("a.pdf", b"%PDX".to_vec(), "pdf_to_word").await.unwrap_err();
        assert!(matches!(err, HandleFailure::ConversionFailed { .. }));
        assert!(err.to_string().starts_with("Conversion failed: "));
        assert!(!h.storage().exists(Bucket::Converted, "a.docx").await);
    }

    #[tokio::test]
    async fn expired_output_is_output_missing() {
        let tmp = TempDir::new().unwrap();
        let h = handler(&tmp, |d| d.with(ConversionKind::TextToPdf, upper));

        let out = h.handle("a.txt", b"x".to_vec(), "txt_to_pdf").await.unwrap();
        h.storage().delete(Bucket::Converted, &out.name).await.unwrap();

        let err = h.fetch(&out).await.unwrap_err();
        assert_eq!(err.to_string(), "Conversion failed. Please try again.");
    }

    #[tokio::test]
    async fn hostile_name_is_stored_flat() {
        let tmp = TempDir::new().unwrap();
        let h = handler(&tmp, |d| d.with(ConversionKind::TextToPdf, upper));

        let out = h
            .handle("../../outside.txt", b"x".to_vec(), "txt_to_pdf")
            .await
            .unwrap();
        assert_eq!(out.name, "outside.pdf");
        assert!(h.storage().exists(Bucket::Incoming, "outside.txt").await);
        assert!(!tmp.path().join("outside.txt").exists());
    }
}
