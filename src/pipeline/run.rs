//! The job orchestrator: one background task per uploaded deck.
//!
//! Sequencing is strictly `convert → rasterize → (ocr → summarize)` per
//! slide, one slide at a time in ascending order, with a fixed delay
//! between summarization calls to respect provider rate limits.
//!
//! Failure handling follows the two-tier taxonomy in [`crate::error`]:
//! conversion and rasterisation errors are fatal (job moves to `Error`);
//! OCR and summarization errors are slide-local (inline placeholder, job
//! continues). After the last slide the job is `Completed` unconditionally,
//! even if every slide recorded an error.
//!
//! The whole run owns a [`TempDir`]; dropping it on every exit path —
//! success, fatal error, or cancellation — is the one correctness-critical
//! resource contract in this crate.

use crate::config::{AppConfig, SummaryMode};
use crate::error::PipelineError;
use crate::job::{Job, JobProducer, JobStatus, JobStore, SlideResult, StreamEvent};
use crate::pipeline::DocumentPipeline;
use crate::summarize::SummarizationBackend;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

/// Fixed summary for slides where OCR found no text. In text mode the
/// backend is not called for these slides; vision mode always sends the
/// image.
pub const NO_TEXT_SUMMARY: &str = "No text detected on this slide.";

/// Text placeholder recorded when OCR itself fails for a slide.
pub const OCR_ERROR_TEXT: &str = "[Error extracting text]";

/// Everything one background task needs to process a job.
pub struct JobContext {
    pub job_id: String,
    pub store: JobStore,
    pub producer: JobProducer,
    /// Holds the uploaded file and all intermediate artifacts. Removed from
    /// disk when this context is dropped, whatever the exit path.
    pub work_dir: TempDir,
    /// The staged upload inside `work_dir`.
    pub input_path: PathBuf,
    pub pipeline: Arc<dyn DocumentPipeline>,
    pub backend: Arc<dyn SummarizationBackend>,
    pub config: Arc<AppConfig>,
}

/// Progress heuristic while slides are being processed: conversion and
/// rasterisation together model the first 20%, slides span the next 60%,
/// and the final 20% is reserved until the terminal transition sets 100.
pub fn slide_progress(slide: usize, total: usize) -> u8 {
    (20 + slide * 60 / total.max(1)) as u8
}

/// Run one job to its terminal state. Never panics on pipeline failure;
/// every exit path leaves the job in `Completed` or `Error` and pushes the
/// `Done` sentinel onto the event queue.
pub async fn run_job(ctx: JobContext) {
    let JobContext {
        job_id,
        store,
        producer,
        work_dir,
        input_path,
        pipeline,
        backend,
        config,
    } = ctx;

    store
        .update(&job_id, |j| {
            j.status = JobStatus::Processing;
            j.message = "Converting to PDF...".to_string();
        })
        .await;

    let pdf_dir = work_dir.path().join("pdf");
    let pdf_path = match pipeline.convert(&input_path, &pdf_dir).await {
        Ok(p) => p,
        Err(e) => return fail_job(&store, &job_id, &producer.events, e).await,
    };

    store
        .update(&job_id, |j| {
            j.advance_progress(20);
            j.message = "Converting PDF to images...".to_string();
        })
        .await;

    let images_dir = work_dir.path().join("images");
    let slides = match pipeline.rasterize(&pdf_path, &images_dir).await {
        Ok(s) => s,
        Err(e) => return fail_job(&store, &job_id, &producer.events, e).await,
    };

    let total = slides.len();
    info!(job = %job_id, slides = total, "pipeline entering per-slide processing");

    for (idx, image) in slides.iter().enumerate() {
        let slide = idx + 1;

        if producer.cancel.is_cancelled() {
            return fail_job(
                &store,
                &job_id,
                &producer.events,
                PipelineError::Internal("job cancelled".to_string()),
            )
            .await;
        }

        store
            .update(&job_id, |j| {
                j.advance_progress(slide_progress(slide, total));
                j.message = format!("Processing slide {slide}/{total}...");
            })
            .await;

        let (text, ocr_error) = match pipeline.extract_text(slide, image).await {
            Ok(text) => (text, None),
            Err(e) => {
                warn!(job = %job_id, slide, error = %e, "text extraction failed");
                (OCR_ERROR_TEXT.to_string(), Some(e))
            }
        };

        // Vision mode summarizes the raw image and never consults the OCR
        // output, so blank or failed extraction does not suppress the call.
        let summary = match config.summary_mode {
            SummaryMode::Vision => match backend.summarize_image(slide, image).await {
                Ok(summary) => summary,
                Err(e) => {
                    warn!(job = %job_id, slide, error = %e, "summarization failed");
                    format!("Error: {}", e.detail())
                }
            },
            SummaryMode::Text => {
                if let Some(e) = ocr_error {
                    format!("Error: {}", e.detail())
                } else if text.trim().is_empty() {
                    // Blank slide: skip the remote call entirely.
                    NO_TEXT_SUMMARY.to_string()
                } else {
                    match backend.summarize_text(slide, &text).await {
                        Ok(summary) => summary,
                        Err(e) => {
                            warn!(job = %job_id, slide, error = %e, "summarization failed");
                            format!("Error: {}", e.detail())
                        }
                    }
                }
            }
        };

        let result = SlideResult {
            slide,
            text,
            summary,
        };

        store
            .update(&job_id, |j| j.results.push(result.clone()))
            .await;
        let _ = producer.events.send(StreamEvent::Slide(result));

        if slide < total && config.processing_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(config.processing_delay_ms)).await;
        }
    }

    store
        .update(&job_id, |j| {
            j.status = JobStatus::Completed;
            j.advance_progress(100);
            j.message = "Processing complete!".to_string();
        })
        .await;
    let _ = producer.events.send(StreamEvent::Done);

    info!(job = %job_id, slides = total, "job completed");
    // work_dir (and every intermediate artifact) is removed here.
    drop(work_dir);
}

/// Terminal failure: record the diagnostic, keep partial state readable,
/// close the event stream.
async fn fail_job(
    store: &JobStore,
    job_id: &str,
    events: &UnboundedSender<StreamEvent>,
    err: PipelineError,
) {
    warn!(job = %job_id, error = %err, "job failed");
    store
        .update(job_id, |j| {
            j.status = JobStatus::Error;
            j.message = err.to_string();
        })
        .await;
    let _ = events.send(StreamEvent::Done);
}
