//! Persistence gateway for conversation turns and tool invocations.
//!
//! The engine treats storage as best-effort: a failed write is logged and
//! the run continues on its in-memory state.

pub mod memory;

use async_trait::async_trait;
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent_loop::ToolStatus;
use crate::error::Result;
use crate::types::{ModelMessage, Role};

pub use memory::InMemoryStore;

pub type MessageId = Uuid;
pub type InvocationId = Uuid;

/// A persisted conversation message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: MessageId,
    pub chat_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl StoredMessage {
    /// The message as sent to the model.
    pub fn to_model_message(&self) -> ModelMessage {
        match self.role {
            Role::System => ModelMessage::system(&self.content),
            Role::User => ModelMessage::user(&self.content),
            Role::Assistant | Role::Tool => ModelMessage::assistant(&self.content),
        }
    }
}

/// Fields to write for one tool invocation. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Builder)]
pub struct ToolInvocationUpdate {
    #[builder(into)]
    pub call_id: String,
    #[builder(into)]
    pub tool_name: Option<String>,
    pub status: Option<ToolStatus>,
    pub params: Option<serde_json::Value>,
    pub result: Option<serde_json::Value>,
    #[builder(into)]
    pub error: Option<String>,
    pub execution_time: Option<f64>,
    pub message_id: Option<MessageId>,
}

/// A persisted tool invocation row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocationRecord {
    pub id: InvocationId,
    pub chat_id: String,
    pub call_id: String,
    pub tool_name: String,
    pub status: ToolStatus,
    pub params: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub execution_time: Option<f64>,
    pub message_id: Option<MessageId>,
}

/// Durable store consulted and updated by the driver and dispatcher.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn append_message(&self, chat_id: &str, role: Role, content: &str) -> Result<MessageId>;

    /// Insert or update the invocation keyed on `(chat_id, update.call_id)`.
    async fn upsert_tool_invocation(
        &self,
        chat_id: &str,
        update: ToolInvocationUpdate,
    ) -> Result<InvocationId>;

    /// Messages of a conversation in creation order.
    async fn read_history(&self, chat_id: &str) -> Result<Vec<StoredMessage>>;
}
