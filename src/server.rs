//! HTTP surface: upload, polling, and SSE streaming.
//!
//! The handlers own no pipeline logic. `POST /upload` validates the request,
//! stages the file into a per-job temp dir, and spawns the background task;
//! everything after that is observed through `GET /status/{job_id}` (full
//! snapshot) or `GET /stream/{job_id}` (per-slide server-sent events, closed
//! by the `done` sentinel).
//!
//! Cross-origin policy is permissive — the service fronts a browser client
//! on a different origin and carries no credentials of its own.

use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::job::{Job, JobStore, StreamEvent};
use crate::pipeline::run::{run_job, JobContext};
use crate::pipeline::{DocumentPipeline, ExternalTools};
use crate::summarize::{Provider, RemoteSummarizerFactory, SummarizerFactory};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path as AxumPath, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use uuid::Uuid;

/// Uploads above this size are rejected before any processing.
const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared application state. Cheap to clone; handlers receive it via
/// axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub store: JobStore,
    pub pipeline: Arc<dyn DocumentPipeline>,
    pub summarizers: Arc<dyn SummarizerFactory>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Production wiring: external tools plus real HTTP backends.
    pub fn production(config: AppConfig) -> Self {
        let config = Arc::new(config);
        Self {
            store: JobStore::new(),
            pipeline: Arc::new(ExternalTools::new(config.dpi)),
            summarizers: Arc::new(RemoteSummarizerFactory::new(Arc::clone(&config))),
            config,
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/upload", post(upload))
        .route("/status/{job_id}", get(status))
        .route("/stream/{job_id}", get(stream))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A request- or pipeline-level failure mapped onto an HTTP response.
///
/// The body shape (`{"detail": …}`) distinguishes invalid input (400-class)
/// from pipeline failures (500-class); slide-local degradation never reaches
/// this type — it stays inline in a 200 payload.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    fn not_found(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            detail: detail.into(),
        }
    }

    fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

/// GET / — liveness.
async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "slides2text API is running" }))
}

/// Accepted upload extensions.
fn is_supported_deck(filename: &str) -> bool {
    let lower = filename.to_ascii_lowercase();
    lower.ends_with(".ppt") || lower.ends_with(".pptx")
}

/// Fields collected from the multipart form.
#[derive(Default)]
struct UploadForm {
    filename: Option<String>,
    file_bytes: Option<Vec<u8>>,
    provider: Option<String>,
    style: Option<String>,
    openai_api_key: Option<String>,
    gemini_api_key: Option<String>,
}

impl UploadForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read multipart field: {e}")))?
        {
            match field.name().unwrap_or_default() {
                "file" => {
                    form.filename = field.file_name().map(|s| s.to_string());
                    let bytes = field.bytes().await.map_err(|e| {
                        ApiError::bad_request(format!("Failed to read uploaded file: {e}"))
                    })?;
                    form.file_bytes = Some(bytes.to_vec());
                }
                "provider" => form.provider = Some(read_text(field).await?),
                "style" => form.style = Some(read_text(field).await?),
                "openai_api_key" => form.openai_api_key = Some(read_text(field).await?),
                "gemini_api_key" => form.gemini_api_key = Some(read_text(field).await?),
                other => debug!(field = other, "ignoring unknown multipart field"),
            }
        }
        Ok(form)
    }

    /// Per-request key for the provider, if one was supplied non-empty.
    fn request_key(&self, provider: Provider) -> Option<&str> {
        let key = match provider {
            Provider::OpenAi => self.openai_api_key.as_deref(),
            Provider::Gemini => self.gemini_api_key.as_deref(),
        };
        key.filter(|k| !k.trim().is_empty())
    }
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read multipart field: {e}")))
}

/// POST /upload — validate, stage, and start a job.
async fn upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut form = UploadForm::read(multipart).await?;

    let filename = form
        .filename
        .take()
        .ok_or_else(|| ApiError::bad_request("Missing 'file' field"))?;
    if !is_supported_deck(&filename) {
        return Err(ApiError::bad_request(
            "Only PowerPoint files (.ppt, .pptx) are allowed",
        ));
    }
    let file_bytes = form
        .file_bytes
        .take()
        .ok_or_else(|| ApiError::bad_request("Uploaded file is empty"))?;

    let provider = match form.provider.as_deref() {
        None | Some("") => Provider::default(),
        Some(tag) => Provider::parse(tag)
            .ok_or_else(|| ApiError::bad_request(format!("Unknown provider '{tag}'")))?,
    };

    // Caller-supplied key wins over the server-side default; with neither,
    // reject the whole job upfront rather than failing every slide.
    let api_key = form
        .request_key(provider)
        .or_else(|| state.config.server_key(provider))
        .map(|k| k.to_string())
        .ok_or_else(|| {
            ApiError::bad_request(
                PipelineError::MissingApiKey {
                    provider: provider.to_string(),
                }
                .to_string(),
            )
        })?;

    // Per-job scratch space; the background task owns it and drops it on
    // every exit path.
    let work_dir = tempfile::tempdir()
        .map_err(|e| ApiError::internal(format!("Failed to create working directory: {e}")))?;

    // Keep only the final path component of the client-supplied name.
    let safe_name = Path::new(&filename)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "upload.pptx".to_string());
    let input_path = work_dir.path().join(safe_name);
    let byte_count = file_bytes.len();
    tokio::fs::write(&input_path, file_bytes)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to stage upload: {e}")))?;

    // The job is registered only once staging succeeded, so a failed upload
    // never leaves a stranded entry in the store.
    let job_id = Uuid::new_v4().to_string();
    let producer = state.store.insert(Job::new(&job_id)).await;

    info!(
        job = %job_id,
        file = %filename,
        provider = %provider,
        style = form.style.as_deref().unwrap_or("concise"),
        bytes = byte_count,
        "upload accepted"
    );

    let backend = state.summarizers.create(provider, api_key);
    let ctx = JobContext {
        job_id: job_id.clone(),
        store: state.store.clone(),
        producer,
        work_dir,
        input_path,
        pipeline: Arc::clone(&state.pipeline),
        backend,
        config: Arc::clone(&state.config),
    };
    tokio::spawn(run_job(ctx));

    Ok(Json(json!({ "job_id": job_id })))
}

/// GET /status/{job_id} — full job snapshot.
async fn status(
    State(state): State<AppState>,
    AxumPath(job_id): AxumPath<String>,
) -> Result<Json<Job>, ApiError> {
    state
        .store
        .get(&job_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Job not found"))
}

/// GET /stream/{job_id} — SSE of per-slide results, terminated by `done`.
async fn stream(
    State(state): State<AppState>,
    AxumPath(job_id): AxumPath<String>,
) -> Result<Sse<impl futures::Stream<Item = Result<Event, Infallible>>>, ApiError> {
    if state.store.get(&job_id).await.is_none() {
        return Err(ApiError::not_found("Job not found"));
    }
    let rx = state.store.take_queue(&job_id).await.ok_or(ApiError {
        status: StatusCode::CONFLICT,
        detail: "Stream already consumed for this job".to_string(),
    })?;

    // Single-consumer queue: emit slide events until the sentinel (or a
    // dropped producer) and then end the response stream.
    let events = futures::stream::unfold(Some(rx), |state| async move {
        let mut rx = state?;
        match rx.recv().await {
            Some(StreamEvent::Slide(result)) => {
                let data = serde_json::to_string(&result).unwrap_or_else(|_| "{}".to_string());
                Some((Ok(Event::default().event("slide").data(data)), Some(rx)))
            }
            Some(StreamEvent::Done) | None => {
                Some((Ok(Event::default().event("done").data("{}")), None))
            }
        }
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}
