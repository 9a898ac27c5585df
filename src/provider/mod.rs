//! Model provider trait and the OpenAI-compatible implementation.

pub mod http;
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::types::{ChatChunk, GenerationSettings, ModelMessage};

pub use openai::OpenAiProvider;

/// Fragments of one streamed completion, in arrival order.
pub type ChunkStream = BoxStream<'static, Result<ChatChunk, EngineError>>;

/// A request sent to a model provider.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ModelMessage>,
    /// Tool schema set offered to the model. Empty means no tools.
    pub tools: Vec<ToolDefinition>,
    pub settings: GenerationSettings,
}

/// Tool definition sent to the provider API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A streaming chat-completion backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name (e.g., "openai").
    fn provider_name(&self) -> &str;
    /// The model ID this provider instance serves.
    fn model_id(&self) -> &str;

    /// Open a streaming completion call.
    ///
    /// Errors returned here mean the stream never opened; errors yielded by
    /// the stream mean it broke mid-flight. Both are transport failures.
    async fn stream_chat(&self, request: &ChatRequest) -> Result<ChunkStream, EngineError>;
}

/// Create the configured provider.
pub fn create_provider(config: &EngineConfig) -> Result<Arc<dyn ChatProvider>, EngineError> {
    Ok(Arc::new(OpenAiProvider::from_config(config)?))
}
