//! CLI binary for edgequake-convert.
//!
//! Runs the HTTP service by default. The `convert` subcommand performs a
//! single conversion locally through the same handler, without a server.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_convert::{
    server, ConversionKind, Dispatcher, Handler, ServerConfig, Storage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve on the default port (3000, or $PORT)
  edgequake-convert

  # Serve on port 8080, keep files for 5 minutes
  edgequake-convert --port 8080 --age-limit 300

  # One-off local conversion
  edgequake-convert convert notes.txt --kind txt_to_pdf -o out/

  # Upload from a client
  curl -F file=@notes.txt -F conversion=txt_to_pdf http://localhost:3000/convert -OJ

CONVERSION KINDS:
  pdf_to_word    PDF  → DOCX   (text only)
  word_to_pdf    DOCX → PDF    (requires pandoc)
  txt_to_pdf     TXT  → PDF
  image_to_pdf   PNG/JPEG/GIF/BMP/WebP/TIFF → PDF
  pdf_to_image   PDF  → PNG    (first page only)

ENVIRONMENT VARIABLES:
  PORT                      Listening port
  PDFIUM_LIB_PATH           libpdfium file, or the directory containing it
  RUST_LOG                  Log filter, overrides --verbose / --quiet
"#;

#[derive(Parser, Debug)]
#[command(
    name = "edgequake-convert",
    version,
    about = "File conversion web service with self-expiring storage",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    server: ServerArgs,

    /// Debug-level logging.
    #[arg(short, long, global = true, env = "EDGEQUAKE_CONVERT_VERBOSE")]
    verbose: bool,

    /// Errors only.
    #[arg(short, long, global = true, env = "EDGEQUAKE_CONVERT_QUIET")]
    quiet: bool,

    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    print_config: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert one local file and exit.
    Convert {
        /// File to convert.
        input: PathBuf,

        /// Conversion kind, e.g. txt_to_pdf.
        #[arg(short, long)]
        kind: String,

        /// Directory to write the result into.
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
}

#[derive(Args, Debug)]
struct ServerArgs {
    /// Interface to listen on.
    #[arg(long, env = "EDGEQUAKE_CONVERT_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on.
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Directory holding uploads/ and converted/.
    #[arg(long, env = "EDGEQUAKE_CONVERT_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    /// Seconds after which stored files are deleted.
    #[arg(long, env = "EDGEQUAKE_CONVERT_AGE_LIMIT", default_value_t = 60)]
    age_limit: u64,

    /// Seconds between cleanup passes.
    #[arg(long, env = "EDGEQUAKE_CONVERT_SWEEP_INTERVAL", default_value_t = 30,
          value_parser = clap::value_parser!(u64).range(1..))]
    sweep_interval: u64,

    /// Maximum upload size in MiB.
    #[arg(long, env = "EDGEQUAKE_CONVERT_MAX_UPLOAD_MB", default_value_t = 50)]
    max_upload_mb: usize,

    /// pandoc executable used for word_to_pdf.
    #[arg(long, env = "EDGEQUAKE_CONVERT_PANDOC", default_value = "pandoc")]
    pandoc: String,

    /// PDF engine passed to pandoc (--pdf-engine).
    #[arg(long, env = "EDGEQUAKE_CONVERT_PDF_ENGINE")]
    pdf_engine: Option<String>,

    /// libpdfium file or directory.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Resolution for pdf_to_image.
    #[arg(long, env = "EDGEQUAKE_CONVERT_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,
}

impl ServerArgs {
    fn to_config(&self) -> Result<ServerConfig> {
        let mut builder = ServerConfig::builder()
            .host(self.host.clone())
            .port(self.port)
            .data_dir(&self.data_dir)
            .age_limit(Duration::from_secs(self.age_limit))
            .sweep_interval(Duration::from_secs(self.sweep_interval))
            .max_upload_bytes(self.max_upload_mb.saturating_mul(1024 * 1024))
            .pandoc_path(self.pandoc.clone())
            .render_dpi(self.dpi);
        if let Some(ref engine) = self.pdf_engine {
            builder = builder.pandoc_pdf_engine(engine.clone());
        }
        if let Some(ref lib) = self.pdfium_lib {
            builder = builder.pdfium_lib_path(lib);
        }
        builder.build().context("Invalid configuration")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = cli.server.to_config()?;

    if cli.print_config {
        println!(
            "{}",
            serde_json::to_string_pretty(&config).context("Failed to serialize configuration")?
        );
        return Ok(());
    }

    match cli.command {
        Some(Command::Convert {
            input,
            kind,
            output_dir,
        }) => convert_once(&config, &input, &kind, &output_dir, !cli.quiet).await,
        None => {
            server::run(config, shutdown_signal())
                .await
                .context("Server failed")?;
            info!("Server stopped");
            Ok(())
        }
    }
}

/// Resolve on Ctrl-C. If the handler cannot be installed, never resolve.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn convert_once(
    config: &ServerConfig,
    input: &Path,
    kind: &str,
    output_dir: &Path,
    show_progress: bool,
) -> Result<()> {
    if kind.parse::<ConversionKind>().is_err() {
        let known: Vec<&str> = ConversionKind::ALL.iter().map(|k| k.as_str()).collect();
        bail!("Unknown conversion kind '{}'. Expected one of: {}", kind, known.join(", "));
    }

    let bytes = tokio::fs::read(input)
        .await
        .with_context(|| format!("Cannot read {}", input.display()))?;
    let uploaded_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    // Private scratch storage, removed on exit.
    let scratch = tempfile::TempDir::new().context("Cannot create scratch directory")?;
    let storage = Storage::open(scratch.path().join("uploads"), scratch.path().join("converted"))
        .context("Cannot prepare scratch storage")?;
    let dispatcher = Dispatcher::with_defaults(storage.clone(), config);
    let handler = Handler::new(storage, Arc::new(dispatcher));

    let bar = show_progress.then(|| {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Converting");
        bar.set_message(format!("{} ({})", input.display(), kind));
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    });

    let result = match handler.handle(&uploaded_name, bytes, kind).await {
        Ok(entry) => handler.fetch(&entry).await.map(|bytes| (entry, bytes)),
        Err(e) => Err(e),
    };
    if let Some(bar) = bar {
        bar.finish_and_clear();
    }

    let (entry, bytes) = match result {
        Ok(ok) => ok,
        Err(failure) => {
            eprintln!("{} {}", red("✘"), failure);
            bail!("Conversion failed");
        }
    };

    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("Cannot create {}", output_dir.display()))?;
    let target = output_dir.join(&entry.name);
    tokio::fs::write(&target, &bytes)
        .await
        .with_context(|| format!("Cannot write {}", target.display()))?;

    if show_progress {
        eprintln!(
            "{} {}  →  {}  ({} bytes)",
            green("✔"),
            input.display(),
            bold(&target.display().to_string()),
            bytes.len()
        );
    }
    Ok(())
}
