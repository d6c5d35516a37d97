//! End-to-end tests over HTTP.
//!
//! Most tests run the real router and sweepers against a temp data
//! directory, with simple in-process converters registered in place of the
//! pdfium and pandoc engines. Tests that drive the real engines need a
//! pdfium library and are gated behind the `E2E_ENABLED` environment
//! variable.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture
//!
//! Including the pdfium-backed tests:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=/path/to/libpdfium.so cargo test --test e2e -- --nocapture

use edgequake_convert::{
    server, Bucket, ConversionKind, ConvertError, Dispatcher, Handler, ServerConfig,
    ServerConfigBuilder, Storage,
};
use reqwest::multipart::{Form, Part};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

// ── Test helpers ─────────────────────────────────────────────────────────────

macro_rules! e2e_skip_unless_enabled {
    () => {
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run pdfium-backed tests");
            return;
        }
    };
}

/// A running server plus the handles needed to inspect and stop it.
struct TestServer {
    addr: SocketAddr,
    storage: Storage,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
    _dir: TempDir,
}

impl TestServer {
    async fn start(
        configure: impl FnOnce(ServerConfigBuilder) -> ServerConfigBuilder,
        dispatcher: impl FnOnce(Storage, &ServerConfig) -> Dispatcher,
    ) -> Self {
        let dir = TempDir::new().unwrap();
        let mut builder = ServerConfig::builder().host("127.0.0.1").port(0).data_dir(dir.path());
        if let Ok(lib) = std::env::var("PDFIUM_LIB_PATH") {
            builder = builder.pdfium_lib_path(lib);
        }
        let config = configure(builder).build().unwrap();

        let storage = Storage::from_config(&config).unwrap();
        let handler = Handler::new(storage.clone(), Arc::new(dispatcher(storage.clone(), &config)));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            server::serve(listener, handler, &config, async {
                let _ = stopped.await;
            })
            .await
            .unwrap();
        });

        Self {
            addr,
            storage,
            stop: Some(stop),
            task,
            _dir: dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn convert(&self, file_name: &str, bytes: Vec<u8>, kind: &str) -> reqwest::Response {
        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name.to_string()))
            .text("conversion", kind.to_string());
        reqwest::Client::new()
            .post(self.url("/convert"))
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    async fn names(&self, bucket: Bucket) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.storage.dir(bucket))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        tokio::time::timeout(Duration::from_secs(5), &mut self.task)
            .await
            .expect("server did not stop")
            .unwrap();
    }
}

fn upper(input: &Path, output: &Path) -> Result<(), ConvertError> {
    let text = std::fs::read_to_string(input).map_err(|e| ConvertError::Io {
        path: input.to_path_buf(),
        source: e,
    })?;
    std::fs::write(output, text.to_uppercase()).map_err(|e| ConvertError::Io {
        path: output.to_path_buf(),
        source: e,
    })
}

fn fake_dispatcher(storage: Storage, _: &ServerConfig) -> Dispatcher {
    Dispatcher::new(storage)
        .with(ConversionKind::TextToPdf, upper)
        .with(
            ConversionKind::WordToPdf,
            |_: &Path, _: &Path| -> Result<(), ConvertError> {
                Err(ConvertError::ToolFailed {
                    tool: "pandoc".into(),
                    status: "exit status: 64".into(),
                    stderr: "unknown reader".into(),
                })
            },
        )
}

fn defaults(b: ServerConfigBuilder) -> ServerConfigBuilder {
    b
}

fn header<'a>(resp: &'a reqwest::Response, name: &str) -> Option<&'a str> {
    resp.headers().get(name).and_then(|v| v.to_str().ok())
}

// ── Fake-converter tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_unsupported_kind_returns_message_and_keeps_upload() {
    let srv = TestServer::start(defaults, fake_dispatcher).await;

    let resp = srv.convert("report.txt", b"hello".to_vec(), "txt_to_mp3").await;
    assert_eq!(resp.status(), 200);
    assert!(header(&resp, "content-disposition").is_none());
    assert_eq!(resp.text().await.unwrap(), "Conversion type not supported.");

    assert_eq!(srv.names(Bucket::Incoming).await, vec!["report.txt"]);
    assert!(srv.names(Bucket::Converted).await.is_empty());
    srv.stop().await;
}

#[tokio::test]
async fn test_successful_conversion_returns_attachment() {
    let srv = TestServer::start(defaults, fake_dispatcher).await;

    let resp = srv.convert("report.txt", b"hello".to_vec(), "txt_to_pdf").await;
    assert_eq!(resp.status(), 200);
    assert_eq!(header(&resp, "content-type"), Some("application/pdf"));
    assert_eq!(
        header(&resp, "content-disposition"),
        Some("attachment; filename=\"report.pdf\"")
    );
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"HELLO");

    assert_eq!(srv.names(Bucket::Converted).await, vec!["report.pdf"]);
    srv.stop().await;
}

#[tokio::test]
async fn test_converter_failure_is_reported_in_body() {
    let srv = TestServer::start(defaults, fake_dispatcher).await;

    let resp = srv.convert("cv.docx", b"PK".to_vec(), "word_to_pdf").await;
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.unwrap();
    assert!(body.starts_with("Conversion failed: "), "body: {body}");
    assert!(body.contains("unknown reader"), "body: {body}");

    assert!(srv.names(Bucket::Converted).await.is_empty());
    srv.stop().await;
}

#[tokio::test]
async fn test_missing_conversion_field() {
    let srv = TestServer::start(defaults, fake_dispatcher).await;

    let form = Form::new().part("file", Part::bytes(b"x".to_vec()).file_name("a.txt"));
    let resp = reqwest::Client::new()
        .post(srv.url("/convert"))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body = resp.text().await.unwrap();
    assert!(body.starts_with("Error during conversion: "), "body: {body}");
    assert!(body.contains("conversion"), "body: {body}");
    srv.stop().await;
}

#[tokio::test]
async fn test_non_multipart_request_is_a_text_failure() {
    let srv = TestServer::start(defaults, fake_dispatcher).await;

    let resp = reqwest::Client::new()
        .post(srv.url("/convert"))
        .body("plain body")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(resp
        .text()
        .await
        .unwrap()
        .starts_with("Error during conversion: "));
    srv.stop().await;
}

#[tokio::test]
async fn test_index_and_kinds() {
    let srv = TestServer::start(defaults, fake_dispatcher).await;

    let html = reqwest::get(srv.url("/")).await.unwrap().text().await.unwrap();
    assert!(html.contains("value=\"txt_to_pdf\""));
    assert!(html.contains("value=\"word_to_pdf\""));
    assert!(!html.contains("value=\"pdf_to_image\""));

    let kinds: serde_json::Value = reqwest::get(srv.url("/kinds"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ids: Vec<&str> = kinds
        .as_array()
        .unwrap()
        .iter()
        .map(|k| k["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["word_to_pdf", "txt_to_pdf"]);
    assert_eq!(kinds[1]["extension"], "pdf");
    srv.stop().await;
}

#[tokio::test]
async fn test_entries_expire() {
    let srv = TestServer::start(
        |b| {
            b.age_limit(Duration::from_millis(300))
                .sweep_interval(Duration::from_millis(100))
        },
        fake_dispatcher,
    )
    .await;

    let resp = srv.convert("notes.txt", b"bye".to_vec(), "txt_to_pdf").await;
    assert_eq!(resp.bytes().await.unwrap().as_ref(), b"BYE");

    let mut remaining = (vec!["x".to_string()], vec!["x".to_string()]);
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        remaining = (
            srv.names(Bucket::Incoming).await,
            srv.names(Bucket::Converted).await,
        );
        if remaining.0.is_empty() && remaining.1.is_empty() {
            break;
        }
    }
    assert!(remaining.0.is_empty(), "incoming not swept: {:?}", remaining.0);
    assert!(remaining.1.is_empty(), "converted not swept: {:?}", remaining.1);
    srv.stop().await;
}

#[tokio::test]
async fn test_hostile_file_name_is_flattened() {
    let srv = TestServer::start(defaults, fake_dispatcher).await;

    let resp = srv.convert("../../escape.txt", b"x".to_vec(), "txt_to_pdf").await;
    assert_eq!(
        header(&resp, "content-disposition"),
        Some("attachment; filename=\"escape.pdf\"")
    );
    assert_eq!(srv.names(Bucket::Incoming).await, vec!["escape.txt"]);
    srv.stop().await;
}

// ── pdfium-backed tests ──────────────────────────────────────────────────────

fn real_dispatcher(storage: Storage, config: &ServerConfig) -> Dispatcher {
    Dispatcher::with_defaults(storage, config)
}

async fn text_pdf(srv: &TestServer, lines: usize) -> Vec<u8> {
    let text: String = (1..=lines).map(|i| format!("Line number {i}\n")).collect();
    let resp = srv.convert("sample.txt", text.into_bytes(), "txt_to_pdf").await;
    assert_eq!(header(&resp, "content-type"), Some("application/pdf"));
    resp.bytes().await.unwrap().to_vec()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_real_txt_to_pdf() {
    e2e_skip_unless_enabled!();
    let srv = TestServer::start(defaults, real_dispatcher).await;

    let pdf = text_pdf(&srv, 5).await;
    assert!(pdf.starts_with(b"%PDF"), "not a PDF: {:?}", &pdf[..pdf.len().min(16)]);
    srv.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_real_pdf_to_image_renders_first_page_only() {
    e2e_skip_unless_enabled!();
    let srv = TestServer::start(defaults, real_dispatcher).await;

    // 77 lines → three pages with the default layout.
    let pdf = text_pdf(&srv, 77).await;
    let resp = srv.convert("sample.pdf", pdf, "pdf_to_image").await;
    assert_eq!(header(&resp, "content-type"), Some("image/png"));
    let png = resp.bytes().await.unwrap();

    let img = image::load_from_memory(&png).unwrap();
    // A4 at 200 DPI.
    assert!((1600..=1700).contains(&img.width()), "width {}", img.width());

    let pngs: Vec<String> = srv
        .names(Bucket::Converted)
        .await
        .into_iter()
        .filter(|n| n.ends_with(".png"))
        .collect();
    assert_eq!(pngs, vec!["sample.png"]);
    srv.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_real_pdf_to_word() {
    e2e_skip_unless_enabled!();
    let srv = TestServer::start(defaults, real_dispatcher).await;

    let pdf = text_pdf(&srv, 3).await;
    let resp = srv.convert("sample.pdf", pdf, "pdf_to_word").await;
    assert_eq!(
        header(&resp, "content-disposition"),
        Some("attachment; filename=\"sample.docx\"")
    );
    let docx = resp.bytes().await.unwrap();
    assert!(docx.starts_with(b"PK"));
    srv.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_real_corrupt_pdf_fails_cleanly() {
    e2e_skip_unless_enabled!();
    let srv = TestServer::start(defaults, real_dispatcher).await;

    let resp = srv
        .convert("broken.pdf", b"%PDF-1.7 truncated".to_vec(), "pdf_to_image")
        .await;
    let body = resp.text().await.unwrap();
    assert!(body.starts_with("Conversion failed: "), "body: {body}");
    assert!(srv.names(Bucket::Converted).await.is_empty());
    srv.stop().await;
}
