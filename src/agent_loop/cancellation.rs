//! Cooperative cancellation: a shared stop flag and the control-channel listener.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::relay::Broker;

/// Write-once-true flag shared by a run's driver and its listener.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Payload that asks a run to stop.
pub fn stop_command() -> String {
    serde_json::json!({ "action": "stop" }).to_string()
}

/// Whether a control payload is a stop request. Any other shape is ignored.
pub fn is_stop_command(payload: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(payload)
        .ok()
        .and_then(|v| v.get("action").and_then(|a| a.as_str()).map(|a| a == "stop"))
        .unwrap_or(false)
}

/// Background task watching a run's control channel.
///
/// The subscription is established before [`CancellationListener::start`]
/// returns. Tearing the listener down never fails: a listener blocked on its
/// subscription is cancelled and its unsubscribe is best-effort.
pub struct CancellationListener {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl CancellationListener {
    pub async fn start(broker: &dyn Broker, channel: String, flag: StopFlag) -> Self {
        let token = CancellationToken::new();
        let mut subscription = match broker.subscribe(&channel).await {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!(channel = %channel, error = %e, "stop listener unavailable; run cannot be stopped remotely");
                return Self { token, task: None };
            }
        };

        let cancelled = token.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    message = subscription.next() => match message {
                        Some(payload) if is_stop_command(&payload) => {
                            info!(channel = %channel, "stop requested");
                            flag.set();
                            break;
                        }
                        Some(payload) => debug!(channel = %channel, payload = %payload, "ignoring control message"),
                        None => break,
                    },
                }
            }
            subscription.unsubscribe();
        });

        Self {
            token,
            task: Some(task),
        }
    }

    /// Cancel the listener and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                debug!(error = %e, "stop listener ended abnormally");
            }
        }
    }
}

impl Drop for CancellationListener {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
