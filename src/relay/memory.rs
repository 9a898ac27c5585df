//! In-process broker backed by `tokio::sync::broadcast`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

use super::{ControlSubscriber, EventRelay, Subscription};
use crate::error::{EngineError, Result};

const DEFAULT_CAPACITY: usize = 1024;

/// Per-channel broadcast fan-out.
///
/// Channels are created on first subscribe and pruned once every receiver
/// is gone. A slow subscriber that falls more than `capacity` messages
/// behind skips the missed messages.
pub struct InMemoryBroker {
    capacity: usize,
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Number of live subscribers on a channel.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .lock()
            .ok()
            .and_then(|channels| channels.get(channel).map(|tx| tx.receiver_count()))
            .unwrap_or(0)
    }

    fn lock(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, broadcast::Sender<String>>>> {
        self.channels
            .lock()
            .map_err(|_| EngineError::Broker("channel table poisoned".into()))
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventRelay for InMemoryBroker {
    async fn publish(&self, channel: &str, payload: &str) -> Result<usize> {
        let mut channels = self.lock()?;
        let Some(tx) = channels.get(channel) else {
            return Ok(0);
        };
        match tx.send(payload.to_string()) {
            Ok(delivered) => Ok(delivered),
            Err(_) => {
                channels.remove(channel);
                Ok(0)
            }
        }
    }
}

#[async_trait]
impl ControlSubscriber for InMemoryBroker {
    async fn subscribe(&self, channel: &str) -> Result<Subscription> {
        let rx = {
            let mut channels = self.lock()?;
            channels
                .entry(channel.to_string())
                .or_insert_with(|| broadcast::channel(self.capacity).0)
                .subscribe()
        };
        let name = channel.to_string();
        let messages = BroadcastStream::new(rx).filter_map(move |item| {
            let payload = match item {
                Ok(payload) => Some(payload),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(channel = %name, skipped, "subscriber lagged; messages dropped");
                    None
                }
            };
            futures::future::ready(payload)
        });
        Ok(Subscription::new(channel, messages.boxed()))
    }
}
