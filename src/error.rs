//! Error types for the slides2text pipeline.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PipelineError`] — **Fatal**: the job cannot proceed at all (missing
//!   external tool, document conversion failed, zero pages rasterised).
//!   The orchestrator moves the job to its `Error` terminal state and keeps
//!   the upstream diagnostic in the job message.
//!
//! * [`SlideError`] — **Non-fatal**: a single slide failed (OCR glitch,
//!   summarization API error) but all other slides are fine. Converted into
//!   an inline placeholder stored in that slide's result so callers can
//!   inspect partial success rather than losing the whole deck to one bad
//!   slide.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors produced by the conversion pipeline.
///
/// Slide-level failures use [`SlideError`] and are stored inline in the
/// slide's result rather than propagated here.
#[derive(Debug, Error)]
pub enum PipelineError {
    // ── External tool errors ──────────────────────────────────────────────
    /// A required external binary is not on the execution PATH.
    #[error("'{binary}' was not found on PATH. {hint}")]
    MissingDependency { binary: String, hint: String },

    /// LibreOffice exited non-zero; `stderr` carries its diagnostic output.
    #[error("Document conversion failed for '{}': {stderr}", path.display())]
    ConversionFailed { path: PathBuf, stderr: String },

    /// LibreOffice reported success but the expected PDF never appeared.
    #[error("Converted PDF not found at '{}'", path.display())]
    OutputMissing { path: PathBuf },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// pdfium could not open the intermediate PDF.
    #[error("PDF '{}' could not be opened: {detail}", path.display())]
    CorruptPdf { path: PathBuf, detail: String },

    /// Rasterisation produced zero page images. Treated as a hard failure,
    /// not an empty success.
    #[error("No page images were produced from '{}'", path.display())]
    EmptyDocument { path: PathBuf },

    /// pdfium returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: usize, detail: String },

    // ── Request / config errors ───────────────────────────────────────────
    /// No API key for the selected provider, neither in the request nor in
    /// the server configuration. Rejected before the job starts.
    #[error("No API key configured for provider '{provider}'")]
    MissingApiKey { provider: String },

    /// Configuration value out of range or unparsable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O and catch-all ─────────────────────────────────────────────────
    /// Filesystem error while staging the upload or intermediate artifacts.
    #[error("I/O error at '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Unexpected internal error (task panic, channel wiring).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error scoped to a single slide.
///
/// The orchestrator converts these into inline placeholder strings in the
/// slide's result and continues with the next slide. A job never aborts
/// because of a `SlideError`.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum SlideError {
    /// OCR failed for this slide's image.
    #[error("Slide {slide}: text extraction failed: {detail}")]
    OcrFailed { slide: usize, detail: String },

    /// The summarization backend failed (auth, rate limit, network, or a
    /// malformed response). The upstream diagnostic is preserved verbatim.
    #[error("Slide {slide}: summarization failed: {detail}")]
    SummaryFailed { slide: usize, detail: String },
}

impl SlideError {
    /// The provider diagnostic, without the slide prefix. Used when building
    /// the inline `Error: …` summary placeholder.
    pub fn detail(&self) -> &str {
        match self {
            SlideError::OcrFailed { detail, .. } => detail,
            SlideError::SummaryFailed { detail, .. } => detail,
        }
    }
}
