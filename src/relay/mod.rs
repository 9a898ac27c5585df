//! Pub/sub relay between a run and its observers.
//!
//! A run publishes [`Event`] envelopes on its event channel and listens for
//! stop requests on its control channel. Delivery is plain pub/sub: a
//! subscriber sees only what is published after it subscribed, and nothing is
//! buffered for observers that are not connected.

pub mod event;
pub mod memory;
pub mod sse;

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::stream::{BoxStream, Stream};

use crate::error::Result;

pub use event::{Event, EventType};
pub use memory::InMemoryBroker;

/// Publishing half of a broker.
#[async_trait]
pub trait EventRelay: Send + Sync {
    /// Publish a raw payload. Returns how many subscribers received it.
    async fn publish(&self, channel: &str, payload: &str) -> Result<usize>;
}

/// Subscribing half of a broker.
#[async_trait]
pub trait ControlSubscriber: Send + Sync {
    async fn subscribe(&self, channel: &str) -> Result<Subscription>;
}

/// A broker that can both publish and subscribe.
pub trait Broker: EventRelay + ControlSubscriber {}

impl<T: EventRelay + ControlSubscriber + ?Sized> Broker for T {}

/// Live subscription to one channel, yielding raw payloads in publish order.
pub struct Subscription {
    channel: String,
    messages: BoxStream<'static, String>,
}

impl Subscription {
    pub fn new(channel: impl Into<String>, messages: BoxStream<'static, String>) -> Self {
        Self {
            channel: channel.into(),
            messages,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Stop receiving. Best-effort: never fails.
    pub fn unsubscribe(self) {
        tracing::debug!(channel = %self.channel, "unsubscribed");
    }
}

impl Stream for Subscription {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<String>> {
        self.messages.as_mut().poll_next(cx)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .finish()
    }
}

/// Serialize and publish one envelope.
pub async fn publish_event<R: EventRelay + ?Sized>(
    relay: &R,
    channel: &str,
    event: &Event,
) -> Result<usize> {
    relay.publish(channel, &event.to_json()?).await
}
