use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::entities::order::OrderStatus;
use crate::entities::order_item::ItemStatus;

/// Events emitted after lifecycle mutations commit. Consumers (notification
/// fan-out, audit sinks) subscribe through the processing loop; the services
/// only enqueue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    /// An order-level transition forced every item to `status`.
    OrderItemsCascaded {
        order_id: Uuid,
        status: ItemStatus,
    },
    /// A postponed order was resumed and its items re-triaged.
    OrderResumed(Uuid),
    OrderItemStatusChanged {
        order_id: Uuid,
        item_id: Uuid,
        old_status: ItemStatus,
        new_status: ItemStatus,
    },
    OrderItemAssigned {
        order_id: Uuid,
        item_id: Uuid,
        engineer_id: Uuid,
    },
    OrderItemScheduleChanged {
        order_id: Uuid,
        item_id: Uuid,
    },
    /// The auto-progression trigger advanced the order.
    OrderAutoProgressed {
        order_id: Uuid,
        new_status: OrderStatus,
    },
    EmployeeCreated(Uuid),
    EmployeeUpdated(Uuid),
    EmployeeDeactivated(Uuid),
    EmployeeActivated(Uuid),
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends a batch of events in order, stopping at the first failure.
    pub async fn send_all(&self, events: Vec<Event>) -> Result<(), String> {
        for event in events {
            self.send(event).await?;
        }
        Ok(())
    }
}

/// Drains the event channel. Notification delivery (SMS/email providers)
/// lives behind this seam; today every event is logged and acknowledged.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        debug!("Received event: {:?}", event);

        match &event {
            Event::OrderCreated(order_id) => {
                info!(order_id = %order_id, "order created");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(
                    order_id = %order_id,
                    from = %old_status,
                    to = %new_status,
                    "order status changed"
                );
            }
            Event::OrderItemsCascaded { order_id, status } => {
                info!(order_id = %order_id, status = %status, "order items cascaded");
            }
            Event::OrderResumed(order_id) => {
                info!(order_id = %order_id, "postponed order resumed for re-triage");
            }
            Event::OrderItemStatusChanged {
                order_id,
                item_id,
                old_status,
                new_status,
            } => {
                info!(
                    order_id = %order_id,
                    item_id = %item_id,
                    from = %old_status,
                    to = %new_status,
                    "order item status changed"
                );
            }
            Event::OrderItemAssigned {
                order_id,
                item_id,
                engineer_id,
            } => {
                info!(
                    order_id = %order_id,
                    item_id = %item_id,
                    engineer_id = %engineer_id,
                    "engineer assigned to order item"
                );
            }
            Event::OrderItemScheduleChanged { order_id, item_id } => {
                info!(order_id = %order_id, item_id = %item_id, "order item schedule changed");
            }
            Event::OrderAutoProgressed {
                order_id,
                new_status,
            } => {
                info!(order_id = %order_id, to = %new_status, "order auto-progressed");
            }
            Event::EmployeeCreated(id) => info!(employee_id = %id, "employee created"),
            Event::EmployeeUpdated(id) => info!(employee_id = %id, "employee updated"),
            Event::EmployeeDeactivated(id) => info!(employee_id = %id, "employee deactivated"),
            Event::EmployeeActivated(id) => info!(employee_id = %id, "employee reactivated"),
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_all_preserves_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        let order_id = Uuid::new_v4();
        sender
            .send_all(vec![
                Event::OrderCreated(order_id),
                Event::OrderAutoProgressed {
                    order_id,
                    new_status: OrderStatus::Scheduled,
                },
            ])
            .await
            .unwrap();

        assert!(matches!(rx.recv().await, Some(Event::OrderCreated(id)) if id == order_id));
        assert!(matches!(
            rx.recv().await,
            Some(Event::OrderAutoProgressed { .. })
        ));
    }

    #[tokio::test]
    async fn send_fails_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender.send(Event::OrderCreated(Uuid::new_v4())).await.is_err());
    }
}
