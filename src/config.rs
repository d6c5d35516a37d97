//! Configuration types for the conversion service.
//!
//! Every knob lives in [`ServerConfig`], built via [`ServerConfigBuilder`].
//! The page layout used by the text-to-PDF converter is split out into
//! [`TextLayout`].

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the bucket directory holding uploads.
pub const UPLOADS_DIR: &str = "uploads";

/// Name of the bucket directory holding converted files.
pub const CONVERTED_DIR: &str = "converted";

/// Configuration for the conversion server.
///
/// # Example
/// ```rust
/// use edgequake_convert::ServerConfig;
/// use std::time::Duration;
///
/// let config = ServerConfig::builder()
///     .port(8080)
///     .age_limit(Duration::from_secs(120))
///     .build()
///     .unwrap();
/// assert_eq!(config.port, 8080);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to listen on. Default: `0.0.0.0`.
    pub host: String,

    /// TCP port. Default: 3000.
    pub port: u16,

    /// Directory under which `uploads/` and `converted/` are created.
    /// Default: the working directory.
    pub data_dir: PathBuf,

    /// Entries strictly older than this are swept. Default: 60 s.
    pub age_limit: Duration,

    /// Pause between two sweeps of the same bucket. Default: 30 s.
    pub sweep_interval: Duration,

    /// Largest accepted request body in bytes. Default: 50 MiB.
    pub max_upload_bytes: usize,

    /// Path or name of the pandoc executable. Default: `pandoc`.
    pub pandoc_path: String,

    /// Value for pandoc's `--pdf-engine`, if any.
    pub pandoc_pdf_engine: Option<String>,

    /// Explicit pdfium shared library. If None, a library in the working
    /// directory is tried, then the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Rendering DPI for PDF-to-image. Range: 72–600. Default: 200.
    pub render_dpi: u32,

    /// Cap on either dimension of the rendered image. Range: 100–20000.
    /// Default: 4000.
    pub max_rendered_pixels: u32,

    /// Layout for text-to-PDF.
    pub text_layout: TextLayout,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            data_dir: PathBuf::from("."),
            age_limit: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(30),
            max_upload_bytes: 50 * 1024 * 1024,
            pandoc_path: "pandoc".to_string(),
            pandoc_pdf_engine: None,
            pdfium_lib_path: None,
            render_dpi: 200,
            max_rendered_pixels: 4000,
            text_layout: TextLayout::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new builder for `ServerConfig`.
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder {
            config: Self::default(),
        }
    }

    /// Directory of the Incoming bucket.
    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join(UPLOADS_DIR)
    }

    /// Directory of the Converted bucket.
    pub fn converted_dir(&self) -> PathBuf {
        self.data_dir.join(CONVERTED_DIR)
    }

    /// `host:port` string suitable for `TcpListener::bind`.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.data_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn age_limit(mut self, limit: Duration) -> Self {
        self.config.age_limit = limit;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n.max(1024);
        self
    }

    pub fn pandoc_path(mut self, path: impl Into<String>) -> Self {
        self.config.pandoc_path = path.into();
        self
    }

    pub fn pandoc_pdf_engine(mut self, engine: impl Into<String>) -> Self {
        self.config.pandoc_pdf_engine = Some(engine.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.pdfium_lib_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn render_dpi(mut self, dpi: u32) -> Self {
        self.config.render_dpi = dpi.clamp(72, 600);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.clamp(100, 20_000);
        self
    }

    pub fn text_layout(mut self, layout: TextLayout) -> Self {
        self.config.text_layout = layout;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServerConfig, ConvertError> {
        let c = &self.config;
        if c.sweep_interval.is_zero() {
            return Err(ConvertError::InvalidConfig(
                "Sweep interval must be greater than zero".into(),
            ));
        }
        if c.host.trim().is_empty() {
            return Err(ConvertError::InvalidConfig("Host must not be empty".into()));
        }
        if c.pandoc_path.trim().is_empty() {
            return Err(ConvertError::InvalidConfig(
                "Pandoc path must not be empty".into(),
            ));
        }
        c.text_layout.validate()?;
        Ok(self.config)
    }
}

/// Page layout for text-to-PDF, in PDF points (1/72 inch).
///
/// The default is an A4 page with Helvetica 12 pt lines drawn from
/// y = 800 down to y = 50 at 20 pt spacing, 80 characters per line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLayout {
    pub page_width: f32,
    pub page_height: f32,
    /// x of every line's baseline start.
    pub left: f32,
    /// y of the first line on each page.
    pub top: f32,
    /// A new page starts once y drops below this.
    pub bottom: f32,
    pub line_height: f32,
    pub font_size: f32,
    /// Lines are truncated to this many characters.
    pub max_chars: usize,
}

impl Default for TextLayout {
    fn default() -> Self {
        Self {
            page_width: 595.28,
            page_height: 841.89,
            left: 50.0,
            top: 800.0,
            bottom: 50.0,
            line_height: 20.0,
            font_size: 12.0,
            max_chars: 80,
        }
    }
}

impl TextLayout {
    fn validate(&self) -> Result<(), ConvertError> {
        if self.line_height <= 0.0 || self.font_size <= 0.0 {
            return Err(ConvertError::InvalidConfig(
                "Line height and font size must be positive".into(),
            ));
        }
        if self.top <= self.bottom || self.top > self.page_height {
            return Err(ConvertError::InvalidConfig(format!(
                "Text area must satisfy bottom < top <= page height, got {}..{} on {}",
                self.bottom, self.top, self.page_height
            )));
        }
        if self.max_chars == 0 {
            return Err(ConvertError::InvalidConfig(
                "Max characters per line must be ≥ 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_contract() {
        let c = ServerConfig::default();
        assert_eq!(c.port, 3000);
        assert_eq!(c.age_limit, Duration::from_secs(60));
        assert_eq!(c.sweep_interval, Duration::from_secs(30));
        assert_eq!(c.uploads_dir(), PathBuf::from("./uploads"));
        assert_eq!(c.converted_dir(), PathBuf::from("./converted"));
        assert_eq!(c.bind_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn builder_clamps_dpi() {
        let c = ServerConfig::builder().render_dpi(10).build().unwrap();
        assert_eq!(c.render_dpi, 72);
        let c = ServerConfig::builder().render_dpi(5000).build().unwrap();
        assert_eq!(c.render_dpi, 600);
    }

    #[test]
    fn builder_clamps_rendered_pixels() {
        let c = ServerConfig::builder().max_rendered_pixels(10).build().unwrap();
        assert_eq!(c.max_rendered_pixels, 100);
        let c = ServerConfig::builder()
            .max_rendered_pixels(u32::MAX)
            .build()
            .unwrap();
        assert_eq!(c.max_rendered_pixels, 20_000);
    }

    #[test]
    fn zero_sweep_interval_rejected() {
        let err = ServerConfig::builder()
            .sweep_interval(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Sweep interval"));
    }

    #[test]
    fn inverted_text_area_rejected() {
        let layout = TextLayout {
            top: 40.0,
            ..TextLayout::default()
        };
        assert!(ServerConfig::builder().text_layout(layout).build().is_err());
    }
}
