//! Core run types for the agent loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::cancellation::StopFlag;
use crate::error::{EngineError, Result};
use crate::store::MessageId;
use crate::tools::ToolContext;

/// Unique run identifier.
pub type RunId = Uuid;

/// Identity of one run: who asked, in which conversation, and its stop flag.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: RunId,
    pub chat_id: String,
    pub user_id: String,
    stop: StopFlag,
}

impl RunContext {
    /// A context with a fresh run id.
    pub fn new(chat_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::with_run_id(Uuid::new_v4(), chat_id, user_id)
    }

    pub fn with_run_id(
        run_id: RunId,
        chat_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            run_id,
            chat_id: chat_id.into(),
            user_id: user_id.into(),
            stop: StopFlag::new(),
        }
    }

    /// Handle that can request a stop from another task.
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_set()
    }

    pub(crate) fn tool_context(&self, tool_call_id: &str) -> ToolContext {
        ToolContext {
            run_id: self.run_id,
            chat_id: self.chat_id.clone(),
            user_id: self.user_id.clone(),
            tool_call_id: tool_call_id.to_string(),
        }
    }
}

/// Lifecycle of one tool invocation.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum ToolStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl ToolStatus {
    /// PENDING → RUNNING → SUCCESS | FAILED, never backwards.
    pub fn can_transition_to(self, next: ToolStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Success)
                | (Self::Running, Self::Failed)
        )
    }
}

/// A dispatched tool call and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub call_id: String,
    /// Slot index the call streamed in on.
    pub slot: u32,
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub status: ToolStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Seconds spent in the handler.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
}

impl ToolInvocation {
    pub fn pending(
        slot: u32,
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            slot,
            tool_name: tool_name.into(),
            arguments,
            status: ToolStatus::Pending,
            result: None,
            error: None,
            execution_time: None,
            message_id: None,
        }
    }

    fn advance(&mut self, next: ToolStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(EngineError::InvalidState(format!(
                "tool call {} cannot move from {} to {}",
                self.call_id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    pub fn start(&mut self) -> Result<()> {
        self.advance(ToolStatus::Running)
    }

    pub fn succeed(&mut self, result: serde_json::Value, execution_time: f64) -> Result<()> {
        self.advance(ToolStatus::Success)?;
        self.result = Some(result);
        self.execution_time = Some(execution_time);
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>, execution_time: f64) -> Result<()> {
        self.advance(ToolStatus::Failed)?;
        self.error = Some(error.into());
        self.execution_time = Some(execution_time);
        Ok(())
    }

    /// Content of the tool-result message fed back to the model.
    pub fn result_for_model(&self) -> serde_json::Value {
        match (&self.result, &self.error) {
            (Some(result), _) => result.clone(),
            (None, Some(error)) => serde_json::json!({ "error": error }),
            (None, None) => serde_json::Value::Null,
        }
    }
}

/// Run lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Stopped,
    Failed,
}

/// How a run ended. Mirrors the terminal envelope that was published.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub finished_at: DateTime<Utc>,
}

impl RunOutcome {
    pub fn completed(run_id: RunId, final_content: impl Into<String>) -> Self {
        Self {
            run_id,
            status: RunStatus::Completed,
            final_content: Some(final_content.into()),
            error: None,
            finished_at: Utc::now(),
        }
    }

    pub fn stopped(run_id: RunId) -> Self {
        Self {
            run_id,
            status: RunStatus::Stopped,
            final_content: None,
            error: None,
            finished_at: Utc::now(),
        }
    }

    pub fn failed(run_id: RunId, error: impl Into<String>) -> Self {
        Self {
            run_id,
            status: RunStatus::Failed,
            final_content: None,
            error: Some(error.into()),
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invocation_status_only_moves_forward() {
        let mut inv = ToolInvocation::pending(0, "call_1", "html", serde_json::json!({}));
        assert!(inv.succeed(serde_json::json!({}), 0.1).is_err());
        inv.start().expect("pending -> running");
        inv.fail("boom", 0.2).expect("running -> failed");
        assert!(inv.start().is_err());
        assert_eq!(inv.status, ToolStatus::Failed);
        assert_eq!(inv.result_for_model(), serde_json::json!({ "error": "boom" }));
    }

    #[test]
    fn status_renders_uppercase() {
        assert_eq!(ToolStatus::Running.to_string(), "RUNNING");
        assert_eq!(
            serde_json::to_value(ToolStatus::Success).ok(),
            Some(serde_json::json!("SUCCESS"))
        );
    }

    #[test]
    fn stop_flag_is_shared_between_clones() {
        let run = RunContext::new("chat", "user");
        let flag = run.stop_flag();
        assert!(!run.is_stopped());
        flag.set();
        assert!(run.is_stopped());
    }
}
