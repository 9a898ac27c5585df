//! Typed access to tool call arguments.

use serde_json::Value;

use crate::error::EngineError;

/// Parsed arguments of one tool call.
///
/// The aggregator only hands out arguments that parsed as JSON, so every
/// accessor here is about shape, not syntax.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolArguments {
    value: Value,
}

impl ToolArguments {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    /// Parse a complete arguments buffer. An empty buffer is an empty object.
    pub fn parse(raw: &str) -> Result<Self, EngineError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::new(Value::Object(Default::default())));
        }
        Ok(Self::new(serde_json::from_str(trimmed)?))
    }

    pub fn raw(&self) -> &Value {
        &self.value
    }

    fn field<'a, T>(
        &'a self,
        key: &str,
        kind: &str,
        extract: impl FnOnce(&'a Value) -> Option<T>,
    ) -> Result<T, EngineError> {
        self.value
            .get(key)
            .and_then(extract)
            .ok_or_else(|| EngineError::InvalidArgument(format!("Missing {kind} argument: {key}")))
    }

    pub fn get_str(&self, key: &str) -> Result<&str, EngineError> {
        self.field(key, "string", Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Result<i64, EngineError> {
        self.field(key, "integer", Value::as_i64)
    }
}
