//! Configuration (layered: code > env > TOML file).
//!
//! [`EngineConfig`] is built once at startup and handed to the provider,
//! driver and dispatcher explicitly; nothing in the crate reads a global.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Default OpenAI-compatible endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// Default completion model.
pub const DEFAULT_MODEL: &str = "gpt-4-turbo-preview";
/// Default system prompt prepended to every conversation.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a presentation assistant. Plan the deck, \
gather material with the available tools, then build the slides one by one.";

/// Engine configuration.
#[derive(Clone, Builder, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Bearer token for the completion endpoint.
    #[builder(into)]
    pub api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API (no trailing `/chat/completions`).
    #[builder(into, default = DEFAULT_BASE_URL.to_string())]
    pub base_url: String,
    #[builder(into, default = DEFAULT_MODEL.to_string())]
    pub model: String,
    #[builder(default = 0.7)]
    pub temperature: f64,
    #[builder(default = 4096)]
    pub max_tokens: u32,
    /// Connect timeout and per-read timeout of the HTTP client.
    #[builder(default = 120_000)]
    pub request_timeout_ms: u64,
    /// Abort a turn when no fragment arrives for this long. Disabled when unset.
    pub stream_idle_timeout_ms: Option<u64>,
    /// Upper bound on streaming calls per run.
    #[builder(default = 50)]
    pub max_turns: usize,
    #[builder(into, default = DEFAULT_SYSTEM_PROMPT.to_string())]
    pub system_prompt: String,
    #[builder(into, default = "agent_run:".to_string())]
    pub event_channel_prefix: String,
    #[builder(into, default = "agent_stop:".to_string())]
    pub control_channel_prefix: String,
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_ms", &self.request_timeout_ms)
            .field("stream_idle_timeout_ms", &self.stream_idle_timeout_ms)
            .field("max_turns", &self.max_turns)
            .field("event_channel_prefix", &self.event_channel_prefix)
            .field("control_channel_prefix", &self.control_channel_prefix)
            .finish()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl EngineConfig {
    /// Load from environment variables (after reading `.env` if present).
    ///
    /// Unparseable numeric values are ignored with a warning and the default
    /// is kept.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                config.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            if !url.trim().is_empty() {
                config.base_url = url;
            }
        }
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            if !model.trim().is_empty() {
                config.model = model;
            }
        }
        if let Some(temperature) = parse_env("OPENAI_TEMPERATURE") {
            config.temperature = temperature;
        }
        if let Some(max_tokens) = parse_env("OPENAI_MAX_TOKENS") {
            config.max_tokens = max_tokens;
        }
        if let Some(max_turns) = parse_env("DECKHAND_MAX_TURNS") {
            config.max_turns = max_turns;
        }
        if let Some(idle) = parse_env("DECKHAND_STREAM_IDLE_TIMEOUT_MS") {
            config.stream_idle_timeout_ms = Some(idle);
        }
        if let Ok(prompt) = std::env::var("DECKHAND_SYSTEM_PROMPT") {
            config.system_prompt = prompt;
        }

        config
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source)
            .map_err(|e| EngineError::Configuration(format!("invalid config: {e}")))
    }

    /// Read and parse a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    /// The API key, or a configuration error naming the missing variable.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| EngineError::Configuration("Missing OPENAI_API_KEY".into()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn stream_idle_timeout(&self) -> Option<Duration> {
        self.stream_idle_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// Channel carrying event envelopes for a run.
    pub fn event_channel(&self, run_id: impl fmt::Display) -> String {
        format!("{}{run_id}", self.event_channel_prefix)
    }

    /// Channel carrying control messages (stop requests) for a run.
    pub fn control_channel(&self, run_id: impl fmt::Display) -> String {
        format!("{}{run_id}", self.control_channel_prefix)
    }
}

fn parse_env<T: std::str::FromStr>(var: &str) -> Option<T> {
    let raw = std::env::var(var).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var, value = %raw, "ignoring unparseable environment value");
            None
        }
    }
}
