use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Domain events emitted by the commerce core. Consumers (mailers, audit
/// trail, back-office sync) subscribe out of process scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(i64),
    OrderApprovedForPayment(i64),
    OrderPaid {
        order_id: i64,
        payment_reference: String,
    },
    /// A decline is a recorded outcome, not an error; the order stays
    /// payable and the customer may retry.
    PaymentDeclined {
        order_id: i64,
        response_code: i64,
    },
    OrderShipped(i64),
    OrderCancelled(i64),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event; delivery is best-effort and never blocks the
    /// commercial operation that produced it.
    pub async fn send(&self, event: Event) {
        if let Err(e) = self.sender.send(event).await {
            warn!("Failed to send event: {}", e);
        }
    }
}

/// Background processor draining the event channel.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderPaid {
                order_id,
                payment_reference,
            } => {
                info!(order_id, payment_reference = %payment_reference, "Order paid");
            }
            Event::PaymentDeclined {
                order_id,
                response_code,
            } => {
                info!(order_id, response_code, "Payment declined");
            }
            other => {
                info!(event = ?other, "Domain event");
            }
        }
    }
}

#[cfg(test)]
pub fn test_sender() -> EventSender {
    let (tx, mut rx) = mpsc::channel(64);
    tokio::spawn(async move { while rx.recv().await.is_some() {} });
    EventSender::new(tx)
}
