//! # slides2text
//!
//! HTTP service that turns an uploaded slide deck into per-slide text and
//! LLM summaries.
//!
//! ## Pipeline
//!
//! ```text
//! POST /upload
//!      │
//!      ▼
//! ┌─────────┐   ┌──────────┐   ┌─────────┐   ┌───────────┐
//! │ convert │──▶│ rasterize│──▶│   ocr   │──▶│ summarize │
//! │ soffice │   │  pdfium  │   │tesseract│   │ LLM HTTP  │
//! └─────────┘   └──────────┘   └─────────┘   └───────────┘
//!      fatal         fatal      slide-local   slide-local
//! ```
//!
//! Conversion and rasterisation failures abort the job; OCR and
//! summarization failures degrade a single slide to an inline placeholder
//! and the job carries on. Progress and per-slide results are observable
//! while the job runs, via polling (`GET /status/{job_id}`) or server-sent
//! events (`GET /stream/{job_id}`).
//!
//! ## Quick start
//!
//! ```no_run
//! use slides2text::config::AppConfig;
//! use slides2text::server::{router, AppState};
//!
//! # async fn serve() -> anyhow::Result<()> {
//! let config = AppConfig::from_env()?;
//! let addr = format!("{}:{}", config.host, config.port);
//! let app = router(AppState::production(config));
//! let listener = tokio::net::TcpListener::bind(&addr).await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod server;
pub mod summarize;

pub use config::{AppConfig, SummaryMode};
pub use error::{PipelineError, SlideError};
pub use job::{Job, JobStatus, JobStore, SlideResult, StreamEvent};
pub use pipeline::{DocumentPipeline, ExternalTools};
pub use server::{router, AppState};
pub use summarize::{Provider, SummarizationBackend, SummarizerFactory};
