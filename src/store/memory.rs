//! In-process store used by the CLI and tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{
    ConversationStore, InvocationId, MessageId, StoredMessage, ToolInvocationRecord,
    ToolInvocationUpdate,
};
use crate::agent_loop::ToolStatus;
use crate::error::{EngineError, Result};
use crate::types::Role;

#[derive(Default)]
struct Tables {
    messages: Vec<StoredMessage>,
    invocations: HashMap<(String, String), ToolInvocationRecord>,
    status_history: HashMap<(String, String), Vec<ToolStatus>>,
}

/// Store that keeps everything in memory, with helpers for inspection.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| EngineError::Persistence("store poisoned".into()))
    }

    /// All messages of a chat, oldest first.
    pub fn messages(&self, chat_id: &str) -> Vec<StoredMessage> {
        self.lock()
            .map(|t| {
                t.messages
                    .iter()
                    .filter(|m| m.chat_id == chat_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn tool_invocation(&self, chat_id: &str, call_id: &str) -> Option<ToolInvocationRecord> {
        self.lock()
            .ok()?
            .invocations
            .get(&(chat_id.to_string(), call_id.to_string()))
            .cloned()
    }

    pub fn tool_invocations(&self, chat_id: &str) -> Vec<ToolInvocationRecord> {
        self.lock()
            .map(|t| {
                t.invocations
                    .values()
                    .filter(|r| r.chat_id == chat_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Every status written for an invocation, in write order.
    pub fn status_history(&self, chat_id: &str, call_id: &str) -> Vec<ToolStatus> {
        self.lock()
            .ok()
            .and_then(|t| {
                t.status_history
                    .get(&(chat_id.to_string(), call_id.to_string()))
                    .cloned()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl ConversationStore for InMemoryStore {
    async fn append_message(&self, chat_id: &str, role: Role, content: &str) -> Result<MessageId> {
        let id = Uuid::new_v4();
        self.lock()?.messages.push(StoredMessage {
            id,
            chat_id: chat_id.to_string(),
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn upsert_tool_invocation(
        &self,
        chat_id: &str,
        update: ToolInvocationUpdate,
    ) -> Result<InvocationId> {
        let key = (chat_id.to_string(), update.call_id.clone());
        let mut tables = self.lock()?;

        if let Some(status) = update.status {
            tables.status_history.entry(key.clone()).or_default().push(status);
        }

        let record = tables
            .invocations
            .entry(key)
            .or_insert_with(|| ToolInvocationRecord {
                id: Uuid::new_v4(),
                chat_id: chat_id.to_string(),
                call_id: update.call_id.clone(),
                tool_name: String::new(),
                status: ToolStatus::Pending,
                params: serde_json::json!({}),
                result: None,
                error: None,
                execution_time: None,
                message_id: None,
            });

        if let Some(name) = update.tool_name {
            record.tool_name = name;
        }
        if let Some(status) = update.status {
            record.status = status;
        }
        if let Some(params) = update.params {
            record.params = params;
        }
        if update.result.is_some() {
            record.result = update.result;
        }
        if update.error.is_some() {
            record.error = update.error;
        }
        if update.execution_time.is_some() {
            record.execution_time = update.execution_time;
        }
        if update.message_id.is_some() {
            record.message_id = update.message_id;
        }

        Ok(record.id)
    }

    async fn read_history(&self, chat_id: &str) -> Result<Vec<StoredMessage>> {
        Ok(self.messages(chat_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn upsert_overwrites_only_provided_fields() {
        let store = InMemoryStore::new();
        let first = store
            .upsert_tool_invocation(
                "chat",
                ToolInvocationUpdate::builder()
                    .call_id("call_1")
                    .tool_name("html")
                    .status(ToolStatus::Running)
                    .params(serde_json::json!({ "index": 1 }))
                    .build(),
            )
            .await
            .expect("insert");
        let message_id = Uuid::new_v4();
        let second = store
            .upsert_tool_invocation(
                "chat",
                ToolInvocationUpdate::builder()
                    .call_id("call_1")
                    .message_id(message_id)
                    .build(),
            )
            .await
            .expect("update");

        assert_eq!(first, second);
        let record = store.tool_invocation("chat", "call_1").expect("row exists");
        assert_eq!(record.tool_name, "html");
        assert_eq!(record.status, ToolStatus::Running);
        assert_eq!(record.params, serde_json::json!({ "index": 1 }));
        assert_eq!(record.message_id, Some(message_id));
        assert_eq!(store.status_history("chat", "call_1"), vec![ToolStatus::Running]);
    }

    #[tokio::test]
    async fn history_is_scoped_to_chat_and_ordered() {
        let store = InMemoryStore::new();
        store.append_message("a", Role::User, "one").await.expect("append");
        store.append_message("b", Role::User, "other").await.expect("append");
        store.append_message("a", Role::Assistant, "two").await.expect("append");

        let history = store.read_history("a").await.expect("read");
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two"]);
    }
}
