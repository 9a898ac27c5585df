//! Server-Sent-Events framing for run observers.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::event::{sse_frame, Event, EventType};
use super::Broker;
use crate::config::EngineConfig;
use crate::error::Result;

/// Follow a run's event channel as SSE frames.
///
/// Subscribes before returning, so every envelope published after this call
/// resolves is observed. The stream opens with a `connected` frame, forwards
/// one frame per envelope and ends after the first `done` or `error`.
/// An envelope that is not valid JSON produces an `error` frame and ends the
/// stream.
pub async fn observe_run(
    broker: Arc<dyn Broker>,
    config: &EngineConfig,
    run_id: impl std::fmt::Display,
) -> Result<BoxStream<'static, String>> {
    let run_id = run_id.to_string();
    let mut subscription = broker.subscribe(&config.event_channel(&run_id)).await?;

    let frames = async_stream::stream! {
        yield Event::connected(&run_id).to_sse_frame();

        while let Some(raw) = subscription.next().await {
            let envelope = match serde_json::from_str::<Value>(&raw) {
                Ok(value) => value,
                Err(e) => {
                    warn!(run_id = %run_id, error = %e, "unparseable envelope on event channel");
                    yield sse_frame(&EventType::Error.to_string(), &json!({ "message": e.to_string() }));
                    break;
                }
            };
            let event_type = envelope
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("message")
                .to_string();
            let payload = envelope.get("payload").cloned().unwrap_or_else(|| json!({}));

            yield sse_frame(&event_type, &payload);

            if event_type.parse::<EventType>().is_ok_and(EventType::is_terminal) {
                break;
            }
        }

        debug!(run_id = %run_id, "observer stream closed");
        subscription.unsubscribe();
    };

    Ok(frames.boxed())
}
