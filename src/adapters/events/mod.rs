//! In-process event bus backed by `tokio::sync::broadcast`.

use crate::ports::{CrmEvent, EventPublisher};
use tokio::sync::broadcast;
use tracing::trace;

pub struct BroadcastEvents {
    tx: broadcast::Sender<CrmEvent>,
}

impl BroadcastEvents {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// New receiver seeing every event published from now on. Slow receivers
    /// lag and skip events rather than block publishers.
    pub fn subscribe(&self) -> broadcast::Receiver<CrmEvent> {
        self.tx.subscribe()
    }
}

impl EventPublisher for BroadcastEvents {
    fn publish(&self, event: CrmEvent) {
        let name = event.event.clone();
        if self.tx.send(event).is_err() {
            trace!(event = %name, "no event subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::events::MESSAGE_NEW;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = BroadcastEvents::new(8);
        let mut rx = bus.subscribe();
        bus.publish(CrmEvent::new("t-1", MESSAGE_NEW, serde_json::json!({ "id": "m" })));
        let got = rx.recv().await.unwrap();
        assert_eq!(got.tenant_id, "t-1");
        assert_eq!(got.event, "message:new");
        assert_eq!(got.payload["id"], "m");
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let bus = BroadcastEvents::new(8);
        bus.publish(CrmEvent::new("t-1", MESSAGE_NEW, ()));
    }
}
