//! Pipeline stages for slide-deck conversion.
//!
//! Each submodule implements exactly one transformation step. Keeping the
//! stages separate makes each independently testable and lets us swap an
//! implementation (e.g. a different OCR engine) without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ convert ──▶ render ──▶ ocr ──▶ summarize
//! (.pptx)   (soffice)   (pdfium)  (tesseract)  (LLM)
//! ```
//!
//! 1. [`convert`] — LibreOffice headless subprocess, document → PDF
//! 2. [`render`]  — rasterise every page to a 200-DPI PNG; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`ocr`]     — Tesseract subprocess per slide image
//! 4. [`run`]     — the job orchestrator: sequencing, progress, per-slide
//!    partial failure, temp-dir lifetime
//!
//! The first three stages sit behind [`DocumentPipeline`] so the
//! orchestrator and the HTTP layer can be exercised against fakes without
//! LibreOffice, pdfium, or Tesseract installed.

pub mod convert;
pub mod ocr;
pub mod render;
pub mod run;

use crate::error::{PipelineError, SlideError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// The document-transformation stages, as seen by the orchestrator.
///
/// [`ExternalTools`] is the production implementation; tests inject fakes.
#[async_trait]
pub trait DocumentPipeline: Send + Sync {
    /// Convert an office document to PDF inside `out_dir`.
    async fn convert(&self, input: &Path, out_dir: &Path) -> Result<PathBuf, PipelineError>;

    /// Rasterise every PDF page to a PNG inside `out_dir`, in page order.
    async fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, PipelineError>;

    /// OCR a single slide image. Empty text is a valid result.
    async fn extract_text(&self, slide: usize, image: &Path) -> Result<String, SlideError>;
}

/// Production pipeline: LibreOffice + pdfium + Tesseract.
pub struct ExternalTools {
    dpi: u32,
}

impl ExternalTools {
    pub fn new(dpi: u32) -> Self {
        Self { dpi }
    }
}

#[async_trait]
impl DocumentPipeline for ExternalTools {
    async fn convert(&self, input: &Path, out_dir: &Path) -> Result<PathBuf, PipelineError> {
        convert::convert_document(input, out_dir).await
    }

    async fn rasterize(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
        render::rasterize_pdf(pdf, out_dir, self.dpi).await
    }

    async fn extract_text(&self, slide: usize, image: &Path) -> Result<String, SlideError> {
        ocr::extract_text(slide, image).await
    }
}
