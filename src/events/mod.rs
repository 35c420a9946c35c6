//! Workflow event channel.
//!
//! Services publish events here; a background task relays them to
//! staff/admin-facing notification sinks. The emitter is a boundary, not a
//! delivery guarantee: a failed send is logged and never fails the request
//! that produced it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::delivery_attempt::AttemptStatus;

/// Events emitted by the order/fulfillment workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    OrderCancelled(Uuid),
    OrderPaid(Uuid),
    OrderDelivered(Uuid),

    CodRecordOpened {
        cod_record_id: Uuid,
        order_id: Uuid,
    },
    StaffAssigned {
        cod_record_id: Uuid,
        staff_id: Uuid,
    },
    DeliveryStatusChanged {
        cod_record_id: Uuid,
        attempt_number: i32,
        status: AttemptStatus,
    },
    PaymentCollected {
        cod_record_id: Uuid,
        order_id: Uuid,
        amount: Decimal,
    },

    ReturnOpened {
        return_id: Uuid,
        cod_record_id: Uuid,
    },
    ReturnApproved(Uuid),
    ReturnCompleted(Uuid),
}

impl Event {
    fn kind(&self) -> &'static str {
        match self {
            Event::OrderCreated(_) => "order_created",
            Event::OrderStatusChanged { .. } => "order_status_changed",
            Event::OrderCancelled(_) => "order_cancelled",
            Event::OrderPaid(_) => "order_paid",
            Event::OrderDelivered(_) => "order_delivered",
            Event::CodRecordOpened { .. } => "cod_record_opened",
            Event::StaffAssigned { .. } => "staff_assigned",
            Event::DeliveryStatusChanged { .. } => "delivery_status_changed",
            Event::PaymentCollected { .. } => "payment_collected",
            Event::ReturnOpened { .. } => "return_opened",
            Event::ReturnApproved(_) => "return_approved",
            Event::ReturnCompleted(_) => "return_completed",
        }
    }
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
            .map_err(|e| format!("Failed to send event: {e}"))
    }

    /// Sends an event, logging a warning on failure instead of surfacing it.
    pub async fn send_or_log(&self, event: Event) {
        let kind = event.kind();
        if let Err(e) = self.send(event).await {
            warn!(event = kind, error = %e, "Failed to emit workflow event");
        }
    }
}

/// Creates a bounded event channel.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Background consumer that relays workflow events to the notification
/// boundary. Currently logs each event as structured JSON; downstream
/// sinks subscribe here.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match serde_json::to_string(&event) {
            Ok(payload) => info!(event = event.kind(), payload = %payload, "Workflow event"),
            Err(e) => warn!(error = %e, "Failed to serialize workflow event"),
        }
    }
    info!("Event channel closed; notification relay stopping");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_flow_through_channel() {
        let (sender, mut rx) = channel(8);
        let order_id = Uuid::new_v4();
        sender.send(Event::OrderCreated(order_id)).await.unwrap();
        match rx.recv().await {
            Some(Event::OrderCreated(id)) => assert_eq!(id, order_id),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn send_or_log_swallows_closed_channel() {
        let (sender, rx) = channel(1);
        drop(rx);
        // Must not panic or error out.
        sender.send_or_log(Event::OrderCancelled(Uuid::new_v4())).await;
    }
}
