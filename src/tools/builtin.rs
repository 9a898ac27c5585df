//! Tools shipped with the engine.
//!
//! Only the planning scratchpad lives here. Domain tools (search, page fetch,
//! slide editing) are registered by the embedding application.

use std::sync::Arc;

use serde_json::json;

use super::registry::ToolRegistry;
use super::tool::{AgentTool, Tool, ToolContext};
use super::types::AgentToolParameters;

const THOUGHT_SUMMARY_CHARS: usize = 200;

/// `think`: a private scratchpad. Records nothing, echoes a short summary.
pub fn think_tool() -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "think",
        "Plan privately: analyse the request, outline the deck structure, and list the tool calls to make next.",
        AgentToolParameters::object()
            .string("thought", "Detailed reasoning and plan", true)
            .build(),
        |args, ctx: ToolContext| async move {
            let thought = args.get_str("thought")?;
            tracing::debug!(chat_id = %ctx.chat_id, chars = thought.chars().count(), "think");
            Ok(json!({
                "success": true,
                "message": "Thought process recorded",
                "thought_summary": summarize(thought),
            }))
        },
    ))
}

fn summarize(thought: &str) -> String {
    match thought.char_indices().nth(THOUGHT_SUMMARY_CHARS) {
        Some((cut, _)) => format!("{}...", &thought[..cut]),
        None => thought.to_string(),
    }
}

/// All built-in tools.
pub fn all_tools() -> Vec<Arc<dyn Tool>> {
    vec![think_tool()]
}

/// A registry holding the built-in tools.
pub fn registry() -> ToolRegistry {
    all_tools()
        .into_iter()
        .fold(ToolRegistry::new(), |registry, tool| registry.with(tool))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolArguments;

    fn ctx() -> ToolContext {
        ToolContext {
            run_id: uuid::Uuid::new_v4(),
            chat_id: "chat".into(),
            user_id: "user".into(),
            tool_call_id: "call_1".into(),
        }
    }

    #[tokio::test]
    async fn think_truncates_long_thoughts() {
        let long = "é".repeat(250);
        let out = think_tool()
            .execute(&ToolArguments::new(json!({ "thought": long })), &ctx())
            .await
            .expect("think succeeds");

        let summary = out["thought_summary"].as_str().expect("summary string");
        assert_eq!(summary.chars().count(), THOUGHT_SUMMARY_CHARS + 3);
        assert!(summary.ends_with("..."));
        assert_eq!(out["success"], true);
    }

    #[tokio::test]
    async fn think_requires_thought() {
        let err = think_tool()
            .execute(&ToolArguments::new(json!({})), &ctx())
            .await
            .expect_err("missing thought");
        assert!(err.to_string().contains("thought"));
    }

    #[test]
    fn registry_contains_think() {
        let registry = registry();
        assert_eq!(registry.names(), vec!["think"]);
    }
}
