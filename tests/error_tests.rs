//! Error display strings and classification as seen by callers.

use pretty_assertions::assert_eq;

use deckhand::error::{EngineError, ErrorCategory};

#[test]
fn display_strings_are_stable() {
    assert_eq!(
        EngineError::tool("web_search", "quota exhausted").to_string(),
        "Tool execution error: web_search: quota exhausted"
    );
    assert_eq!(
        EngineError::UnknownTool("visit_page".into()).to_string(),
        "Unknown tool: visit_page"
    );
    assert_eq!(EngineError::Timeout(500).to_string(), "Timeout after 500ms");
    assert_eq!(
        EngineError::api(502, "bad gateway").to_string(),
        "API error (status 502): bad gateway"
    );
}

#[test]
fn serde_errors_convert_with_question_mark() {
    fn parse(raw: &str) -> deckhand::error::Result<serde_json::Value> {
        Ok(serde_json::from_str(raw)?)
    }
    let err = parse("{").err().expect("invalid json");
    assert_eq!(err.category(), ErrorCategory::Serialization);
    assert!(!err.is_transport());
}

#[test]
fn only_endpoint_failures_end_a_run() {
    let transport = [
        EngineError::Authentication("expired".into()),
        EngineError::RateLimited { retry_after_ms: None },
        EngineError::api(500, "boom"),
        EngineError::Stream("reset".into()),
        EngineError::Timeout(1),
    ];
    assert!(transport.iter().all(EngineError::is_transport));

    let contained = [
        EngineError::tool("html", "render failed"),
        EngineError::InvalidArgument("index".into()),
        EngineError::Persistence("db".into()),
        EngineError::Broker("redis".into()),
        EngineError::Configuration("missing".into()),
    ];
    assert!(!contained.iter().any(EngineError::is_transport));
}
