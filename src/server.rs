//! HTTP surface: upload form, conversion endpoint, kind listing.
//!
//! | Method | Path       | Response                                          |
//! |--------|------------|---------------------------------------------------|
//! | GET    | `/`        | HTML upload form                                  |
//! | POST   | `/convert` | converted file as attachment, or plain-text error |
//! | GET    | `/kinds`   | JSON list of supported conversions                |
//!
//! Conversion failures are answered with status 200 and a `text/plain`
//! body carrying the failure message; clients tell success from failure by
//! the `Content-Disposition` header.

use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::error::{HandleFailure, ServerError};
use crate::handler::Handler;
use crate::kind::ConversionKind;
use crate::storage::{EntryRef, Storage};
use crate::sweeper::SweeperSet;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, warn, Level};

const INDEX_TEMPLATE: &str = include_str!("../templates/index.html");

/// Multipart field carrying the file.
pub const FILE_FIELD: &str = "file";
/// Multipart field carrying the conversion kind identifier.
pub const KIND_FIELD: &str = "conversion";

// ── State ───────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct AppState {
    handler: Handler,
    index: Arc<str>,
}

/// One entry of `GET /kinds`.
#[derive(Debug, Serialize)]
pub struct KindInfo {
    pub id: ConversionKind,
    pub label: &'static str,
    pub extension: &'static str,
}

// ── Router ──────────────────────────────────────────────────────────────────

/// Build the application router around `handler`.
pub fn router(handler: Handler, config: &ServerConfig) -> Router {
    let state = AppState {
        index: render_index(&handler.dispatcher().supported_kinds(), config).into(),
        handler,
    };

    Router::new()
        .route("/", get(index))
        .route("/convert", post(convert))
        .route("/kinds", get(kinds))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Fill the upload form template.
pub fn render_index(kinds: &[ConversionKind], config: &ServerConfig) -> String {
    let options: String = kinds
        .iter()
        .map(|k| {
            format!(
                "        <option value=\"{}\">{}</option>\n",
                k.as_str(),
                k.label()
            )
        })
        .collect();
    INDEX_TEMPLATE
        .replace("{{options}}", options.trim_end())
        .replace("{{age_limit}}", &config.age_limit.as_secs().to_string())
}

// ── Handlers ────────────────────────────────────────────────────────────────

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(state.index.to_string())
}

async fn kinds(State(state): State<AppState>) -> Json<Vec<KindInfo>> {
    let kinds = state
        .handler
        .dispatcher()
        .supported_kinds()
        .into_iter()
        .map(|k| KindInfo {
            id: k,
            label: k.label(),
            extension: k.target_extension(),
        })
        .collect();
    Json(kinds)
}

async fn convert(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    match convert_upload(&state.handler, multipart).await {
        Ok((entry, bytes)) => attachment(&entry, bytes),
        Err(failure) => {
            warn!("Request failed: {}", failure);
            failure_response(&failure)
        }
    }
}

async fn convert_upload(
    handler: &Handler,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(EntryRef, Vec<u8>), HandleFailure> {
    let form = read_form(multipart?).await?;
    let entry = handler.handle(&form.file_name, form.bytes, &form.kind).await?;
    let bytes = handler.fetch(&entry).await?;
    Ok((entry, bytes))
}

struct UploadForm {
    file_name: String,
    bytes: Vec<u8>,
    kind: String,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, HandleFailure> {
    let mut file = None;
    let mut kind = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some(FILE_FIELD) => {
                let name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                file = Some((name, bytes.to_vec()));
            }
            Some(KIND_FIELD) => kind = Some(field.text().await?),
            _ => {}
        }
    }

    let (file_name, bytes) =
        file.ok_or_else(|| HandleFailure::InvalidUpload(format!("missing '{FILE_FIELD}' field")))?;
    let kind =
        kind.ok_or_else(|| HandleFailure::InvalidUpload(format!("missing '{KIND_FIELD}' field")))?;

    Ok(UploadForm {
        file_name,
        bytes,
        kind: kind.trim().to_string(),
    })
}

impl From<MultipartRejection> for HandleFailure {
    fn from(e: MultipartRejection) -> Self {
        HandleFailure::InvalidUpload(e.body_text())
    }
}

impl From<axum::extract::multipart::MultipartError> for HandleFailure {
    fn from(e: axum::extract::multipart::MultipartError) -> Self {
        HandleFailure::InvalidUpload(e.body_text())
    }
}

fn attachment(entry: &EntryRef, bytes: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type_for(&entry.name).to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", entry.name),
            ),
        ],
        bytes,
    )
        .into_response()
}

fn failure_response(failure: &HandleFailure) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        failure.to_string(),
    )
        .into_response()
}

/// MIME type for a converted entry, by extension.
pub fn content_type_for(name: &str) -> &'static str {
    let ext = name.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("docx") => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

// ── Lifecycle ───────────────────────────────────────────────────────────────

/// Serve on an already-bound listener until `shutdown` resolves.
///
/// Sweepers for both buckets run for exactly as long as the server does.
pub async fn serve<F>(
    listener: TcpListener,
    handler: Handler,
    config: &ServerConfig,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let sweepers = SweeperSet::spawn(handler.storage(), config);
    info!(
        "Expiring entries older than {}s, checking every {}s",
        config.age_limit.as_secs(),
        config.sweep_interval.as_secs()
    );

    let app = router(handler, config);
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServerError::Serve);

    info!("Stopping cleanup tasks...");
    sweepers.shutdown().await;
    result
}

/// Open storage, bind `host:port` and serve with the built-in converters.
pub async fn run<F>(config: ServerConfig, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let storage = Storage::from_config(&config)?;
    let dispatcher = Dispatcher::with_defaults(storage.clone(), &config);
    let handler = Handler::new(storage, Arc::new(dispatcher));

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| ServerError::Bind {
            addr: addr.clone(),
            source: e,
        })?;
    info!("Listening on http://{}", addr);

    serve(listener, handler, &config, shutdown).await
}
