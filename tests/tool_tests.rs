//! Tool registry, built-in tools and the dispatcher's failure containment.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use serde_json::json;
use uuid::Uuid;

use deckhand::agent_loop::{ToolDispatcher, ToolOutcome};
use deckhand::tools::builtin::{self, think_tool};
use deckhand::tools::{AgentTool, AgentToolParameters, Tool, ToolArguments, ToolContext, ToolRegistry};

fn ctx() -> ToolContext {
    ToolContext {
        run_id: Uuid::new_v4(),
        chat_id: "chat".into(),
        user_id: "user".into(),
        tool_call_id: "call_1".into(),
    }
}

fn slide_tool() -> AgentTool {
    AgentTool::new(
        "insert_slides",
        "Insert a slide at an index",
        AgentToolParameters::object()
            .integer("index", "Slide position", true)
            .string("layout", "Layout description", false)
            .build(),
        |args, ctx| async move {
            let index = args.get_i64("index")?;
            Ok(json!({ "inserted": index, "call": ctx.tool_call_id }))
        },
    )
}

#[tokio::test]
async fn dispatcher_runs_registered_handler() {
    let registry = ToolRegistry::new().with(Arc::new(slide_tool()));
    let dispatcher = ToolDispatcher::new(Arc::new(registry));

    let outcome = dispatcher
        .execute("insert_slides", &ToolArguments::new(json!({ "index": 2 })), &ctx())
        .await;

    assert_eq!(
        outcome,
        ToolOutcome::Success(json!({ "inserted": 2, "call": "call_1" }))
    );
}

#[tokio::test]
async fn handler_errors_become_failures() {
    let registry = ToolRegistry::new().with(Arc::new(slide_tool()));
    let dispatcher = ToolDispatcher::new(Arc::new(registry));

    let outcome = dispatcher
        .execute("insert_slides", &ToolArguments::new(json!({})), &ctx())
        .await;

    assert!(matches!(outcome, ToolOutcome::Failure(ref e) if e.contains("index")));
}

#[tokio::test]
async fn unknown_tool_is_a_failure_not_an_error() {
    let dispatcher = ToolDispatcher::new(Arc::new(ToolRegistry::new()));
    let outcome = dispatcher
        .execute("visit_page", &ToolArguments::new(json!({})), &ctx())
        .await;
    assert_eq!(outcome, ToolOutcome::Failure("Unknown tool: visit_page".into()));
}

#[tokio::test]
async fn panicking_handler_is_contained() {
    let boom = AgentTool::new(
        "html",
        "panics",
        AgentToolParameters::empty(),
        |_args, _ctx| async move {
            if true {
                panic!("renderer crashed");
            }
            Ok(json!(null))
        },
    );
    let dispatcher = ToolDispatcher::new(Arc::new(ToolRegistry::new().with(Arc::new(boom))));

    let outcome = dispatcher
        .execute("html", &ToolArguments::new(json!({})), &ctx())
        .await;

    assert_eq!(outcome, ToolOutcome::Failure("tool 'html' panicked".into()));
}

#[tokio::test]
async fn think_tool_summarizes_long_thoughts() {
    let thought = "a".repeat(250);
    let result = think_tool()
        .execute(&ToolArguments::new(json!({ "thought": thought })), &ctx())
        .await
        .expect("think succeeds");

    assert_eq!(result["success"], true);
    assert_eq!(result["message"], "Thought process recorded");
    let summary = result["thought_summary"].as_str().expect("summary");
    assert_eq!(summary.len(), 203);
    assert!(summary.ends_with("..."));
}

#[test]
fn registry_preserves_registration_order_in_definitions() {
    let mut registry = builtin::registry();
    registry.register(Arc::new(slide_tool()));

    let names: Vec<_> = registry.definitions().into_iter().map(|d| d.name).collect();
    assert_eq!(names, vec!["think", "insert_slides"]);

    let schema = &registry.definitions()[1].parameters;
    assert_eq!(schema["type"], "object");
    assert_eq!(schema["required"], json!(["index"]));
}

#[test]
fn re_registering_replaces_in_place() {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(slide_tool()));
    registry.register(think_tool());
    registry.register(Arc::new(AgentTool::new(
        "insert_slides",
        "replacement",
        AgentToolParameters::empty(),
        |_args, _ctx| async move { Ok(json!(null)) },
    )));

    assert_eq!(registry.len(), 2);
    assert_eq!(registry.names(), vec!["insert_slides", "think"]);
    assert_eq!(registry.definitions()[0].description, "replacement");
}
