//! Conversion dispatch: conversion kind → converter.
//!
//! The dispatcher owns the only write path into the Converted bucket. A
//! converter writes into a hidden staged file; the file is renamed to the
//! output name only after the converter returns `Ok` and left a non-empty
//! file behind. Any other outcome drops the staged file, so a partial output
//! is never visible under the output name.

use crate::config::ServerConfig;
use crate::engines::{ImageToPdf, Pandoc, PdfToImage, PdfToWord, TextToPdf};
use crate::error::{ConvertError, DispatchError};
use crate::kind::ConversionKind;
use crate::storage::{Bucket, EntryRef, Storage};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

// ── Converter ───────────────────────────────────────────────────────────────

/// Turn the file at `input` into the file at `output`.
///
/// Implementations block; they are always run on the blocking pool.
pub trait Converter: Send + Sync {
    fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError>;
}

impl<F> Converter for F
where
    F: Fn(&Path, &Path) -> Result<(), ConvertError> + Send + Sync,
{
    fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        self(input, output)
    }
}

// ── Dispatcher ──────────────────────────────────────────────────────────────

/// Registry of converters, keyed by kind.
pub struct Dispatcher {
    storage: Storage,
    converters: HashMap<ConversionKind, Arc<dyn Converter>>,
}

impl Dispatcher {
    /// A dispatcher with no converters; every kind is unsupported.
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            converters: HashMap::new(),
        }
    }

    /// A dispatcher with the built-in engine for every kind.
    pub fn with_defaults(storage: Storage, config: &ServerConfig) -> Self {
        let lib = config.pdfium_lib_path.clone();
        Self::new(storage)
            .with(ConversionKind::PdfToWord, PdfToWord::new(lib.clone()))
            .with(ConversionKind::WordToPdf, Pandoc::from_config(config))
            .with(
                ConversionKind::TextToPdf,
                TextToPdf::new(config.text_layout.clone(), lib.clone()),
            )
            .with(ConversionKind::ImageToPdf, ImageToPdf::new(lib.clone()))
            .with(
                ConversionKind::PdfToImage,
                PdfToImage::new(config.render_dpi, config.max_rendered_pixels, lib),
            )
    }

    /// Add or replace the converter for `kind`.
    pub fn register(&mut self, kind: ConversionKind, converter: Arc<dyn Converter>) {
        self.converters.insert(kind, converter);
    }

    /// Builder-style [`Dispatcher::register`].
    pub fn with(mut self, kind: ConversionKind, converter: impl Converter + 'static) -> Self {
        self.register(kind, Arc::new(converter));
        self
    }

    /// Kinds with a registered converter, in vocabulary order.
    pub fn supported_kinds(&self) -> Vec<ConversionKind> {
        ConversionKind::ALL
            .into_iter()
            .filter(|k| self.converters.contains_key(k))
            .collect()
    }

    /// Convert `input` according to `kind` and register the result in the
    /// Converted bucket under [`ConversionKind::output_name`].
    pub async fn dispatch(&self, kind: &str, input: &EntryRef) -> Result<EntryRef, DispatchError> {
        let unsupported = || DispatchError::Unsupported {
            kind: kind.to_string(),
        };
        let parsed: ConversionKind = kind.parse().map_err(|_| unsupported())?;
        let converter = self
            .converters
            .get(&parsed)
            .cloned()
            .ok_or_else(unsupported)?;

        let output_name = parsed.output_name(&input.name);
        let staged = self
            .storage
            .stage(Bucket::Converted, parsed.target_extension())?;
        let input_path = input.path.clone();

        let outcome = tokio::task::spawn_blocking(move || -> Result<EntryRef, DispatchError> {
            converter
                .convert(&input_path, staged.path())
                .map_err(|source| DispatchError::Failed {
                    kind: parsed.to_string(),
                    source,
                })?;
            if !staged.is_populated() {
                return Err(DispatchError::OutputMissing {
                    kind: parsed.to_string(),
                });
            }
            Ok(staged.commit(&output_name)?)
        })
        .await
        .map_err(|e| DispatchError::Failed {
            kind: parsed.to_string(),
            source: ConvertError::Internal(format!("Converter task panicked: {e}")),
        })?;

        match outcome {
            Ok(ref output) => info!("{} {} → {}", parsed, input.name, output.name),
            Err(ref e) => warn!("{} on {} failed: {}", parsed, input.name, e),
        }
        outcome
    }
}
