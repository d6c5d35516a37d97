//! DOCX → PDF through the `pandoc` executable.
//!
//! pandoc picks the input format from the input extension and the output
//! format from the output extension, so the staged output path must end in
//! `.pdf`. PDF output needs a LaTeX (or other) engine on the host; pass one
//! with `--pdf-engine` when the default is not installed.

use crate::config::ServerConfig;
use crate::dispatch::Converter;
use crate::error::ConvertError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// pandoc-backed converter.
#[derive(Debug, Clone)]
pub struct Pandoc {
    program: String,
    pdf_engine: Option<String>,
}

impl Pandoc {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            pdf_engine: None,
        }
    }

    pub fn with_pdf_engine(mut self, engine: impl Into<String>) -> Self {
        self.pdf_engine = Some(engine.into());
        self
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        let pandoc = Self::new(config.pandoc_path.clone());
        match config.pandoc_pdf_engine {
            Some(ref engine) => pandoc.with_pdf_engine(engine.clone()),
            None => pandoc,
        }
    }

    fn command(&self, input: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(input).arg("-o").arg(output);
        if let Some(ref engine) = self.pdf_engine {
            cmd.arg(format!("--pdf-engine={engine}"));
        }
        cmd
    }
}

impl Converter for Pandoc {
    fn convert(&self, input: &Path, output: &Path) -> Result<(), ConvertError> {
        debug!("Running {} on {}", self.program, input.display());

        let out = self.command(input, output).output().map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ConvertError::ToolMissing {
                    tool: self.program.clone(),
                }
            } else {
                ConvertError::Io {
                    path: PathBuf::from(&self.program),
                    source: e,
                }
            }
        })?;

        if !out.status.success() {
            return Err(ConvertError::ToolFailed {
                tool: self.program.clone(),
                status: out.status.to_string(),
                stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}
