//! OpenAI chat-completion backend.
//!
//! Text summaries go through `/v1/chat/completions` with a system
//! instruction plus a user prompt wrapping the OCR output. Vision summaries
//! send the slide PNG as a base64 data-URI `image_url` part with a fixed
//! instructional prompt; PNG stays lossless so on-slide text survives the
//! round trip.

use crate::config::AppConfig;
use crate::error::SlideError;
use crate::summarize::{slide_text_prompt, SummarizationBackend, SLIDE_IMAGE_PROMPT, SLIDE_TEXT_SYSTEM};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use std::path::Path;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Chat-completion summarizer bound to one API key.
pub struct ChatBackend {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    vision_model: String,
    max_tokens: u32,
    vision_max_tokens: u32,
    temperature: f64,
}

impl ChatBackend {
    pub fn new(http: reqwest::Client, api_key: String, config: &AppConfig) -> Self {
        Self {
            http,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: config.openai_model.clone(),
            vision_model: config.openai_vision_model.clone(),
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

    /// Request body for a text summary.
    fn text_body(&self, text: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SLIDE_TEXT_SYSTEM },
                { "role": "user", "content": slide_text_prompt(text) },
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }

    /// Request body for a vision summary of a base64 PNG.
    fn image_body(&self, png_base64: &str) -> Value {
        json!({
            "model": self.vision_model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": SLIDE_IMAGE_PROMPT },
                    {
                        "type": "image_url",
                        "image_url": { "url": format!("data:image/png;base64,{png_base64}") }
                    },
                ],
            }],
            "max_tokens": self.vision_max_tokens,
        })
    }

    async fn complete(&self, slide: usize, body: Value) -> Result<String, SlideError> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
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
                detail: format!("OpenAI returned {status}: {detail}"),
            });
        }

        let payload: Value = response.json().await.map_err(|e| SlideError::SummaryFailed {
            slide,
            detail: format!("invalid JSON from OpenAI: {e}"),
        })?;

        extract_content(&payload).ok_or_else(|| SlideError::SummaryFailed {
            slide,
            detail: "malformed response: missing choices[0].message.content".to_string(),
        })
    }
}

/// Pull the assistant text out of a chat-completion response.
fn extract_content(payload: &Value) -> Option<String> {
    payload["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
}

#[async_trait]
impl SummarizationBackend for ChatBackend {
    async fn summarize_text(&self, slide: usize, text: &str) -> Result<String, SlideError> {
        debug!(slide, model = %self.model, "OpenAI text summary request");
        self.complete(slide, self.text_body(text)).await
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
        let encoded = STANDARD.encode(&bytes);
        debug!(slide, model = %self.vision_model, bytes = bytes.len(), "OpenAI vision summary request");
        self.complete(slide, self.image_body(&encoded)).await
    }
}
