//! Best-effort persistence for a run.

use std::sync::Arc;

use tracing::warn;

use crate::store::{ConversationStore, MessageId, ToolInvocationUpdate};
use crate::types::Role;

/// Writes a run's messages and tool invocations, logging instead of failing.
pub(crate) struct RunJournal {
    chat_id: String,
    store: Arc<dyn ConversationStore>,
}

impl RunJournal {
    pub(crate) fn new(chat_id: String, store: Arc<dyn ConversationStore>) -> Self {
        Self { chat_id, store }
    }

    pub(crate) fn store(&self) -> &dyn ConversationStore {
        self.store.as_ref()
    }

    pub(crate) async fn append(&self, role: Role, content: &str) -> Option<MessageId> {
        match self.store.append_message(&self.chat_id, role, content).await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(chat_id = %self.chat_id, %role, error = %e, "failed to persist message");
                None
            }
        }
    }

    pub(crate) async fn record(&self, update: ToolInvocationUpdate) {
        let call_id = update.call_id.clone();
        if let Err(e) = self.store.upsert_tool_invocation(&self.chat_id, update).await {
            warn!(chat_id = %self.chat_id, call_id = %call_id, error = %e, "failed to persist tool invocation");
        }
    }
}
