//! The `{type, payload}` envelope published to observers.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use strum::{Display, EnumString};

use crate::error::Result;

/// Envelope type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventType {
    Message,
    ToolCallStart,
    ToolCallProgress,
    ToolCallComplete,
    Done,
    Error,
    Connected,
}

impl EventType {
    /// `done` and `error` end a run's event stream.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// Reason carried by a `done` envelope.
pub const REASON_COMPLETE: &str = "complete";
pub const REASON_STOPPED: &str = "stopped_by_user";

/// One outbound envelope. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl Event {
    fn new(event_type: EventType, payload: Value) -> Self {
        let payload = match payload {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self { event_type, payload }
    }

    pub fn message(content: impl Into<String>) -> Self {
        Self::new(EventType::Message, json!({ "content": content.into() }))
    }

    pub fn tool_call_start(tool_index: u32, tool_name: &str) -> Self {
        Self::new(
            EventType::ToolCallStart,
            json!({ "tool_index": tool_index, "tool_name": tool_name }),
        )
    }

    pub fn tool_call_progress(tool_index: u32, tool_name: &str, params: &Value) -> Self {
        Self::new(
            EventType::ToolCallProgress,
            json!({
                "tool_index": tool_index,
                "tool_name": tool_name,
                "status": "running",
                "params": params,
            }),
        )
    }

    pub fn tool_call_succeeded(
        tool_index: u32,
        tool_name: &str,
        result: &Value,
        execution_time: f64,
    ) -> Self {
        Self::new(
            EventType::ToolCallComplete,
            json!({
                "tool_index": tool_index,
                "tool_name": tool_name,
                "status": "success",
                "result": result,
                "execution_time": execution_time,
            }),
        )
    }

    pub fn tool_call_failed(
        tool_index: u32,
        tool_name: &str,
        error: &str,
        execution_time: f64,
    ) -> Self {
        Self::new(
            EventType::ToolCallComplete,
            json!({
                "tool_index": tool_index,
                "tool_name": tool_name,
                "status": "failed",
                "error": error,
                "execution_time": execution_time,
            }),
        )
    }

    pub fn completed(final_content: &str) -> Self {
        Self::new(
            EventType::Done,
            json!({ "final_content": final_content, "reason": REASON_COMPLETE }),
        )
    }

    pub fn stopped() -> Self {
        Self::new(EventType::Done, json!({ "reason": REASON_STOPPED }))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(EventType::Error, json!({ "message": message.into() }))
    }

    pub fn connected(agent_run_id: impl std::fmt::Display) -> Self {
        Self::new(
            EventType::Connected,
            json!({ "agent_run_id": agent_run_id.to_string() }),
        )
    }

    /// String field of the payload, if present.
    pub fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Server-Sent-Events framing: `event: <type>\ndata: <payload>\n\n`.
    pub fn to_sse_frame(&self) -> String {
        sse_frame(&self.event_type.to_string(), &Value::Object(self.payload.clone()))
    }
}

pub(crate) fn sse_frame(event_type: &str, payload: &Value) -> String {
    format!("event: {event_type}\ndata: {payload}\n\n")
}
