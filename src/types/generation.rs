//! Generation settings and related enums.

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::config::EngineConfig;

/// Settings controlling text generation.
#[derive(Debug, Clone, Builder, Serialize, Deserialize, Default)]
pub struct GenerationSettings {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    /// `tool_choice` sent alongside the tool set; `"auto"` when unset.
    #[builder(into)]
    pub tool_choice: Option<String>,
}

impl GenerationSettings {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_tokens: Some(config.max_tokens),
            temperature: Some(config.temperature),
            tool_choice: None,
        }
    }
}

/// Why generation finished.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    FunctionCall,
}

impl FinishReason {
    /// Parse a provider finish reason. Unknown values yield `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        raw.parse().ok()
    }
}
