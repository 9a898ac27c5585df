//! Convenience re-exports for common use.

pub use crate::agent_loop::{ConversationDriver, RunContext, RunLauncher, RunOutcome, RunStatus};
pub use crate::config::EngineConfig;
pub use crate::error::{EngineError, Result};
pub use crate::provider::{ChatProvider, OpenAiProvider};
pub use crate::relay::{Broker, Event, EventType};
pub use crate::store::ConversationStore;
pub use crate::tools::{AgentTool, AgentToolParameters, Tool, ToolArguments, ToolContext, ToolRegistry};
pub use crate::types::{ChatChunk, FinishReason, GenerationSettings, ModelMessage, Role};
