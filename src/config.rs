//! Server configuration.
//!
//! Every knob lives in one [`AppConfig`] struct so it can be shared across
//! handlers behind an `Arc`, serialised for logging, and replaced wholesale
//! in tests. Values come from `SLIDES2TEXT_`-prefixed environment variables
//! with documented defaults; the binary additionally exposes the
//! server-address fields as clap flags.
//!
//! Caller-supplied per-request API keys (multipart form fields) take
//! precedence over the server-side defaults configured here.

use crate::error::PipelineError;

/// How the summarization backend receives each slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryMode {
    /// Run OCR over the slide image and summarise the extracted text. (default)
    #[default]
    Text,
    /// Send the raw slide image to a multimodal model, skipping OCR text as
    /// the summary input (extracted text is still recorded per slide).
    Vision,
}

impl SummaryMode {
    fn parse(s: &str) -> Result<Self, PipelineError> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(SummaryMode::Text),
            "vision" => Ok(SummaryMode::Vision),
            other => Err(PipelineError::InvalidConfig(format!(
                "summary mode must be 'text' or 'vision', got '{other}'"
            ))),
        }
    }
}

/// Configuration for the slides2text server and pipeline.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server bind address. Default: `0.0.0.0`.
    pub host: String,
    /// Server port. Default: `8000`.
    pub port: u16,

    /// Server-side OpenAI API key, used when the request carries none.
    pub openai_api_key: Option<String>,
    /// Server-side Gemini API key, used when the request carries none.
    pub gemini_api_key: Option<String>,

    /// OpenAI chat model for text summaries. Default: `gpt-3.5-turbo`.
    pub openai_model: String,
    /// OpenAI multimodal model for vision summaries. Default: `o4-mini`.
    pub openai_vision_model: String,
    /// Gemini model identifier. Default: `gemini-pro`.
    pub gemini_model: String,

    /// Maximum summary tokens for text input. Default: 150.
    pub max_tokens: u32,
    /// Maximum summary tokens for image input. Default: 300.
    ///
    /// Vision summaries describe charts and diagrams as well as text, so
    /// they get double the budget of the text variant.
    pub vision_max_tokens: u32,
    /// Sampling temperature for summaries. Default: 0.7.
    pub temperature: f64,

    /// Delay between summarization calls, in milliseconds. Default: 1000.
    ///
    /// A fixed pause between slides keeps a multi-slide deck under the
    /// per-minute rate limits of both hosted providers.
    pub processing_delay_ms: u64,

    /// Rasterisation resolution in DPI. Default: 200.
    pub dpi: u32,

    /// Whether summaries are produced from OCR text or the raw slide image.
    pub summary_mode: SummaryMode,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            openai_api_key: None,
            gemini_api_key: None,
            openai_model: "gpt-3.5-turbo".to_string(),
            openai_vision_model: "o4-mini".to_string(),
            gemini_model: "gemini-pro".to_string(),
            max_tokens: 150,
            vision_max_tokens: 300,
            temperature: 0.7,
            processing_delay_ms: 1000,
            dpi: 200,
            summary_mode: SummaryMode::Text,
        }
    }
}

impl AppConfig {
    /// Load configuration from `SLIDES2TEXT_*` environment variables,
    /// falling back to the documented defaults for anything unset.
    pub fn from_env() -> Result<Self, PipelineError> {
        let mut cfg = Self::default();

        if let Some(host) = env_nonempty("SLIDES2TEXT_HOST") {
            cfg.host = host;
        }
        if let Some(port) = env_nonempty("SLIDES2TEXT_PORT") {
            cfg.port = port
                .parse()
                .map_err(|_| PipelineError::InvalidConfig(format!("invalid port '{port}'")))?;
        }

        cfg.openai_api_key = env_nonempty("OPENAI_API_KEY");
        cfg.gemini_api_key = env_nonempty("GEMINI_API_KEY");

        if let Some(m) = env_nonempty("SLIDES2TEXT_OPENAI_MODEL") {
            cfg.openai_model = m;
        }
        if let Some(m) = env_nonempty("SLIDES2TEXT_OPENAI_VISION_MODEL") {
            cfg.openai_vision_model = m;
        }
        if let Some(m) = env_nonempty("SLIDES2TEXT_GEMINI_MODEL") {
            cfg.gemini_model = m;
        }

        if let Some(v) = env_nonempty("SLIDES2TEXT_MAX_TOKENS") {
            cfg.max_tokens = parse_var("SLIDES2TEXT_MAX_TOKENS", &v)?;
        }
        if let Some(v) = env_nonempty("SLIDES2TEXT_VISION_MAX_TOKENS") {
            cfg.vision_max_tokens = parse_var("SLIDES2TEXT_VISION_MAX_TOKENS", &v)?;
        }
        if let Some(v) = env_nonempty("SLIDES2TEXT_TEMPERATURE") {
            cfg.temperature = parse_var("SLIDES2TEXT_TEMPERATURE", &v)?;
        }
        if let Some(v) = env_nonempty("SLIDES2TEXT_PROCESSING_DELAY_MS") {
            cfg.processing_delay_ms = parse_var("SLIDES2TEXT_PROCESSING_DELAY_MS", &v)?;
        }
        if let Some(v) = env_nonempty("SLIDES2TEXT_DPI") {
            cfg.dpi = parse_var("SLIDES2TEXT_DPI", &v)?;
        }
        if let Some(v) = env_nonempty("SLIDES2TEXT_SUMMARY_MODE") {
            cfg.summary_mode = SummaryMode::parse(&v)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate numeric ranges.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.dpi < 72 || self.dpi > 400 {
            return Err(PipelineError::InvalidConfig(format!(
                "DPI must be 72-400, got {}",
                self.dpi
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(PipelineError::InvalidConfig(format!(
                "temperature must be 0.0-2.0, got {}",
                self.temperature
            )));
        }
        Ok(())
    }

    /// Resolve the configured server-side key for a provider tag.
    pub fn server_key(&self, provider: crate::summarize::Provider) -> Option<&str> {
        match provider {
            crate::summarize::Provider::OpenAi => self.openai_api_key.as_deref(),
            crate::summarize::Provider::Gemini => self.gemini_api_key.as_deref(),
        }
    }
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, PipelineError> {
    value
        .parse()
        .map_err(|_| PipelineError::InvalidConfig(format!("invalid value '{value}' for {name}")))
}
