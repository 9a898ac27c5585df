//! Layered configuration: TOML files and environment variables.

use std::io::Write;
use std::sync::Mutex;

use pretty_assertions::assert_eq;

use deckhand::config::{EngineConfig, DEFAULT_BASE_URL};
use deckhand::error::EngineError;

/// Environment variables are process-global; serialize the tests that touch them.
static ENV_LOCK: Mutex<()> = Mutex::new(());

const VARS: &[&str] = &[
    "OPENAI_API_KEY",
    "OPENAI_BASE_URL",
    "OPENAI_MODEL",
    "OPENAI_TEMPERATURE",
    "OPENAI_MAX_TOKENS",
    "DECKHAND_MAX_TURNS",
    "DECKHAND_STREAM_IDLE_TIMEOUT_MS",
    "DECKHAND_SYSTEM_PROMPT",
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[test]
fn toml_file_overrides_defaults() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(
        file,
        r#"
api_key = "sk-file"
model = "gpt-4o"
max_turns = 8
stream_idle_timeout_ms = 30000
system_prompt = "Build decks."
"#
    )
    .expect("write");

    let config = EngineConfig::from_toml_file(file.path()).expect("parse");

    assert_eq!(config.api_key.as_deref(), Some("sk-file"));
    assert_eq!(config.model, "gpt-4o");
    assert_eq!(config.max_turns, 8);
    assert_eq!(config.stream_idle_timeout_ms, Some(30_000));
    assert_eq!(config.system_prompt, "Build decks.");
    assert_eq!(config.base_url, DEFAULT_BASE_URL);
    assert_eq!(config.event_channel("r"), "agent_run:r");
}

#[test]
fn invalid_toml_is_a_configuration_error() {
    let err = EngineConfig::from_toml_str("max_turns = \"many\"").err().expect("invalid");
    assert!(matches!(err, EngineError::Configuration(ref m) if m.contains("invalid config")));
}

#[test]
fn missing_file_is_a_configuration_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = EngineConfig::from_toml_file(dir.path().join("absent.toml"))
        .err()
        .expect("missing");
    assert!(matches!(err, EngineError::Configuration(ref m) if m.contains("cannot read")));
}

#[test]
fn environment_populates_config() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    std::env::set_var("OPENAI_API_KEY", "sk-env");
    std::env::set_var("OPENAI_MODEL", "gpt-env");
    std::env::set_var("DECKHAND_MAX_TURNS", "12");
    std::env::set_var("DECKHAND_STREAM_IDLE_TIMEOUT_MS", "250");

    let config = EngineConfig::from_env();
    clear_env();

    assert_eq!(config.require_api_key().ok(), Some("sk-env"));
    assert_eq!(config.model, "gpt-env");
    assert_eq!(config.max_turns, 12);
    assert_eq!(
        config.stream_idle_timeout(),
        Some(std::time::Duration::from_millis(250))
    );
}

#[test]
fn unparseable_environment_numbers_keep_defaults() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    clear_env();
    std::env::set_var("OPENAI_MAX_TOKENS", "lots");
    std::env::set_var("OPENAI_API_KEY", "   ");

    let config = EngineConfig::from_env();
    clear_env();

    assert_eq!(config.max_tokens, 4096);
    assert!(matches!(
        config.require_api_key(),
        Err(EngineError::Configuration(_))
    ));
}
