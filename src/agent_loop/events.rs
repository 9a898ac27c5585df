//! Publishing a run's envelopes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{trace, warn};

use super::types::RunId;
use crate::relay::{publish_event, Broker, Event};

/// Publishes envelopes for one run, in emission order.
///
/// Relay failures are logged and swallowed; the run never stops because an
/// observer could not be reached.
pub struct RunEventEmitter {
    run_id: RunId,
    channel: String,
    broker: Arc<dyn Broker>,
    seq: AtomicU64,
}

impl RunEventEmitter {
    pub fn new(run_id: RunId, channel: String, broker: Arc<dyn Broker>) -> Self {
        Self {
            run_id,
            channel,
            broker,
            seq: AtomicU64::new(1),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub async fn emit(&self, event: Event) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        match publish_event(self.broker.as_ref(), &self.channel, &event).await {
            Ok(delivered) => trace!(
                run_id = %self.run_id,
                seq,
                event_type = %event.event_type,
                delivered,
                "event published"
            ),
            Err(e) => warn!(
                run_id = %self.run_id,
                seq,
                event_type = %event.event_type,
                error = %e,
                "failed to publish event"
            ),
        }
    }
}
