//! Tool trait and closure-based tool wrapper.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use super::arguments::ToolArguments;
use super::types::AgentToolParameters;
use crate::error::EngineError;

/// Run-scoped context handed to every tool execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolContext {
    pub run_id: Uuid,
    /// Conversation the run belongs to. Tools that write domain state key on it.
    pub chat_id: String,
    pub user_id: String,
    pub tool_call_id: String,
}

/// Core tool trait. Implement to expose a capability to the model.
///
/// A returned `Err` is contained by the dispatcher: the call is recorded as
/// failed and the error text goes back to the model as the tool result.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (must match what the model calls).
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> &AgentToolParameters;

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolContext,
    ) -> Result<serde_json::Value, EngineError>;
}

type ToolHandler = dyn Fn(
        ToolArguments,
        ToolContext,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value, EngineError>> + Send>>
    + Send
    + Sync;

/// Closure-based tool for quick tool creation.
pub struct AgentTool {
    name: String,
    description: String,
    parameters: AgentToolParameters,
    handler: Arc<ToolHandler>,
}

impl AgentTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: AgentToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value, EngineError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(move |args, ctx| Box::pin(handler(args, ctx))),
        }
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &AgentToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolContext,
    ) -> Result<serde_json::Value, EngineError> {
        (self.handler)(args.clone(), ctx.clone()).await
    }
}

impl std::fmt::Debug for AgentTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closure_tool_receives_chat_scope() {
        let tool = AgentTool::new(
            "echo_chat",
            "Echo the chat id",
            AgentToolParameters::empty(),
            |_args, ctx: ToolContext| async move { Ok(serde_json::json!({ "chat": ctx.chat_id })) },
        );
        let ctx = ToolContext {
            run_id: Uuid::new_v4(),
            chat_id: "chat-7".into(),
            user_id: "u".into(),
            tool_call_id: "call_1".into(),
        };

        let out = tool
            .execute(&ToolArguments::new(serde_json::json!({})), &ctx)
            .await
            .expect("closure succeeds");

        assert_eq!(out, serde_json::json!({ "chat": "chat-7" }));
    }
}
