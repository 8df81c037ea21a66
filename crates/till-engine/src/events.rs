//! # Sale Event Port
//!
//! Completed and voided outcomes are published here after their transaction
//! commits. Notification, reporting and printing/KDS consumers subscribe;
//! the engine never waits on them and a publish with no subscribers is not
//! an error.
//!
//! ```text
//! SaleEngine ──commit──► EventPublisher ──► broadcast ──┬──► notifier
//!                                                       ├──► reporting
//!                                                       └──► printer / KDS
//! ```

use tokio::sync::broadcast;
use tracing::debug;

use till_core::SaleEvent;

/// Fire-and-forget publisher of [`SaleEvent`]s.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    tx: broadcast::Sender<SaleEvent>,
}

impl EventPublisher {
    /// `capacity` is the per-subscriber buffer; lagging subscribers skip
    /// the oldest events.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        EventPublisher { tx }
    }

    /// Publishes an event, returning how many subscribers received it.
    pub fn publish(&self, event: SaleEvent) -> usize {
        let sale_id = event.sale_id().to_string();
        match self.tx.send(event) {
            Ok(receivers) => {
                debug!(sale_id = %sale_id, receivers, "Published sale event");
                receivers
            }
            Err(_) => {
                debug!(sale_id = %sale_id, "No subscribers for sale event");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SaleEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        EventPublisher::new(256)
    }
}
