//! Slide summarization backends.
//!
//! Two hosted providers sit behind one object-safe trait so the orchestrator
//! never branches on a provider string per call: the backend is selected once
//! at job creation and injected into the pipeline task.
//!
//! * [`ChatBackend`] — OpenAI chat completions (`/v1/chat/completions`).
//! * [`GenerativeBackend`] — Google Gemini `generateContent`.
//!
//! Both take the input either as OCR-extracted text or as the raw slide
//! image; which one the pipeline sends is a server-side setting
//! ([`crate::config::SummaryMode`]).

pub mod gemini;
pub mod openai;

pub use gemini::GenerativeBackend;
pub use openai::ChatBackend;

use crate::config::AppConfig;
use crate::error::SlideError;
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Instructional prompt for vision summaries, sent alongside the slide PNG.
pub const SLIDE_IMAGE_PROMPT: &str = "This is a slide from a presentation. Please analyze the \
visual content and text, and provide a concise 2-3 sentence summary focusing on the key points. \
Consider both the text content and any visual elements like diagrams, charts, or images.";

/// System instruction for text summaries.
pub const SLIDE_TEXT_SYSTEM: &str =
    "You are an assistant that summarizes presentation slides into short, clear prose.";

/// Build the user prompt wrapping OCR-extracted slide text.
pub fn slide_text_prompt(text: &str) -> String {
    format!(
        "Provide a concise 2-3 sentence summary of the following slide content, \
focusing on the key points:\n\n{text}"
    )
}

/// The provider tag carried by an upload request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    #[default]
    OpenAi,
    Gemini,
}

impl Provider {
    /// Parse the form-field value. Unknown tags are a request error, not a
    /// silent fallback.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Some(Provider::OpenAi),
            "gemini" => Some(Provider::Gemini),
            _ => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::OpenAi => f.write_str("openai"),
            Provider::Gemini => f.write_str("gemini"),
        }
    }
}

/// A summarization backend for one provider, bound to one API key.
///
/// Implementations never panic on provider failure: authentication, rate
/// limiting, network errors, and malformed responses all surface as
/// [`SlideError::SummaryFailed`] with the upstream diagnostic preserved,
/// which the orchestrator turns into an inline placeholder for that slide.
#[async_trait]
pub trait SummarizationBackend: Send + Sync {
    /// Summarise OCR-extracted slide text.
    async fn summarize_text(&self, slide: usize, text: &str) -> Result<String, SlideError>;

    /// Summarise the raw slide image (multimodal request).
    async fn summarize_image(&self, slide: usize, image_path: &Path)
        -> Result<String, SlideError>;
}

/// Creates a backend for a job at upload time.
///
/// Injected into the application state so tests can substitute a recording
/// fake and assert call counts.
pub trait SummarizerFactory: Send + Sync {
    fn create(&self, provider: Provider, api_key: String) -> Arc<dyn SummarizationBackend>;
}

/// Production factory: real HTTP backends over a shared reqwest client.
pub struct RemoteSummarizerFactory {
    http: reqwest::Client,
    config: Arc<AppConfig>,
}

impl RemoteSummarizerFactory {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

impl SummarizerFactory for RemoteSummarizerFactory {
    fn create(&self, provider: Provider, api_key: String) -> Arc<dyn SummarizationBackend> {
        match provider {
            Provider::OpenAi => Arc::new(ChatBackend::new(
                self.http.clone(),
                api_key,
                &self.config,
            )),
            Provider::Gemini => Arc::new(GenerativeBackend::new(
                self.http.clone(),
                api_key,
                &self.config,
            )),
        }
    }
}
