//! Google Gemini generative backend.
//!
//! Single-prompt `generateContent` requests; the vision variant inlines the
//! slide PNG as an `inline_data` part. Content-safety thresholds are relaxed
//! to `BLOCK_NONE` across all four categories: slide decks routinely trip
//! false positives (medical content, security training) and a blocked
//! response here would surface as a missing summary for an ordinary slide.

use crate::config::AppConfig;
use crate::error::SlideError;
use crate::summarize::{slide_text_prompt, SummarizationBackend, SLIDE_IMAGE_PROMPT};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use std::path::Path;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const SAFETY_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

/// Gemini summarizer bound to one API key.
pub struct GenerativeBackend {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    vision_max_tokens: u32,
    temperature: f64,
}

impl GenerativeBackend {
    pub fn new(http: reqwest::Client, api_key: String, config: &AppConfig) -> Self {
        Self {
            http,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: config.gemini_model.clone(),
            max_tokens: config.max_tokens,
            vision_max_tokens: config.vision_max_tokens,
            temperature: config.temperature,
        }
    }

    /// Point the backend at a different endpoint (mock servers in tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn safety_settings() -> Value {
        Value::Array(
            SAFETY_CATEGORIES
                .iter()
                .map(|category| json!({ "category": category, "threshold": "BLOCK_NONE" }))
                .collect(),
        )
    }

    /// Request body with the given parts and output-token budget.
    fn body(&self, parts: Value, max_tokens: u32) -> Value {
        json!({
            "contents": [{ "parts": parts }],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": max_tokens,
            },
            "safetySettings": Self::safety_settings(),
        })
    }

    async fn generate(&self, slide: usize, body: Value) -> Result<String, SlideError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| SlideError::SummaryFailed {
                slide,
                detail: format!("request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SlideError::SummaryFailed {
                slide,
                detail: format!("Gemini returned {status}: {detail}"),
            });
        }

        let payload: Value = response.json().await.map_err(|e| SlideError::SummaryFailed {
            slide,
            detail: format!("invalid JSON from Gemini: {e}"),
        })?;

        extract_text(&payload).ok_or_else(|| SlideError::SummaryFailed {
            slide,
            detail: "malformed response: missing candidates[0].content.parts[0].text".to_string(),
        })
    }
}

/// Pull the generated text out of a `generateContent` response.
fn extract_text(payload: &Value) -> Option<String> {
    payload["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .map(|s| s.trim().to_string())
}

#[async_trait]
impl SummarizationBackend for GenerativeBackend {
    async fn summarize_text(&self, slide: usize, text: &str) -> Result<String, SlideError> {
        debug!(slide, model = %self.model, "Gemini text summary request");
        let parts = json!([{ "text": slide_text_prompt(text) }]);
        self.generate(slide, self.body(parts, self.max_tokens)).await
    }

    async fn summarize_image(
        &self,
        slide: usize,
        image_path: &Path,
    ) -> Result<String, SlideError> {
        let bytes = tokio::fs::read(image_path)
            .await
            .map_err(|e| SlideError::SummaryFailed {
                slide,
                detail: format!("could not read slide image '{}': {e}", image_path.display()),
            })?;
        debug!(slide, model = %self.model, bytes = bytes.len(), "Gemini vision summary request");
        let parts = json!([
            { "text": SLIDE_IMAGE_PROMPT },
            { "inline_data": { "mime_type": "image/png", "data": STANDARD.encode(&bytes) } },
        ]);
        self.generate(slide, self.body(parts, self.vision_max_tokens))
            .await
    }
}
