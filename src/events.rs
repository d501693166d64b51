use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

/// Events emitted by the booking/payment/settlement engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// A gateway order was opened for a prospective booking.
    OrderOpened {
        order_id: String,
        site_id: Uuid,
        buyer_id: Uuid,
        amount_minor: i64,
    },
    BookingCreated(Uuid),
    BookingConfirmed {
        booking_id: Uuid,
        order_id: String,
    },
    BookingCancelled(Uuid),
    MilestoneReached {
        booking_id: Uuid,
        milestone: String,
    },
    SiteStatusChanged {
        site_id: Uuid,
        old_status: String,
        new_status: String,
    },
    PayoutReleased {
        booking_id: Uuid,
        phase: u8,
        amount: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Consumes events from the channel and logs them for audit. Downstream
/// delivery (webhooks, queues) hangs off this loop when needed.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        info!(event = ?event, "Processing event");
    }
    info!("Event channel closed; processor exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        sender
            .send(Event::BookingCreated(Uuid::new_v4()))
            .await
            .expect("send");
        assert!(matches!(rx.recv().await, Some(Event::BookingCreated(_))));
    }

    #[tokio::test]
    async fn send_fails_after_receiver_drop() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender
            .send(Event::BookingCancelled(Uuid::new_v4()))
            .await
            .is_err());
    }
}
