use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::entities::{OrderStatus, PaymentMethod};

/// Handle services use to publish domain events after a commit.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Publishes without waiting for channel capacity. A full or closed
    /// channel is logged and the event dropped.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.sender.try_send(event) {
            warn!("Dropping domain event: {}", e);
        }
    }
}

/// Domain events of the checkout pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    CheckoutStarted {
        customer_id: i32,
        amount: Decimal,
        line_count: usize,
    },
    CheckoutAborted {
        customer_id: i32,
        restored_lines: usize,
    },
    PaymentAttached {
        customer_id: i32,
        payment_id: i32,
        method: PaymentMethod,
    },
    PaymentMethodChanged {
        customer_id: i32,
        payment_id: i32,
        method: PaymentMethod,
    },
    DigitalPaymentRecorded {
        customer_id: i32,
        payment_id: i32,
        card_id: i32,
    },
    PaymentCaptured {
        customer_id: i32,
        payment_id: i32,
    },
    PaymentRefunded {
        customer_id: i32,
        payment_id: i32,
    },
    OrderCreated {
        customer_id: i32,
        order_id: i32,
        total: Decimal,
    },
    OrderStatusChanged {
        order_id: i32,
        old_status: OrderStatus,
        new_status: OrderStatus,
        at: DateTime<Utc>,
    },
    BasketReconciled {
        customer_id: i32,
        corrected_lines: usize,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::CheckoutStarted { .. } => "checkout_started",
            Event::CheckoutAborted { .. } => "checkout_aborted",
            Event::PaymentAttached { .. } => "payment_attached",
            Event::PaymentMethodChanged { .. } => "payment_method_changed",
            Event::DigitalPaymentRecorded { .. } => "digital_payment_recorded",
            Event::PaymentCaptured { .. } => "payment_captured",
            Event::PaymentRefunded { .. } => "payment_refunded",
            Event::OrderCreated { .. } => "order_created",
            Event::OrderStatusChanged { .. } => "order_status_changed",
            Event::BasketReconciled { .. } => "basket_reconciled",
        }
    }
}

/// Handlers implementing this trait receive every event consumed by
/// [`process_events`].
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: &Event) -> Result<(), String>;
}

/// Drains the event channel until every sender is dropped, logging each event
/// and fanning it out to the registered handlers.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, handlers: Vec<Arc<dyn EventHandler>>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match serde_json::to_string(&event) {
            Ok(payload) => info!(event = event.name(), %payload, "Domain event"),
            Err(_) => info!(event = event.name(), "Domain event: {:?}", event),
        }

        for handler in &handlers {
            if let Err(e) = handler.handle_event(&event).await {
                error!(event = event.name(), "Event handler failed: {}", e);
            }
        }
    }

    info!("Event processing loop finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn handle_event(&self, event: &Event) -> Result<(), String> {
            self.seen.lock().await.push(event.name());
            Ok(())
        }
    }

    #[tokio::test]
    async fn events_reach_handlers_in_order() {
        let (tx, rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);
        let recorder = Arc::new(Recorder::default());

        sender
            .send_or_log(Event::CheckoutStarted {
                customer_id: 1,
                amount: Decimal::new(1000, 2),
                line_count: 2,
            })
            .await;
        sender
            .send_or_log(Event::CheckoutAborted {
                customer_id: 1,
                restored_lines: 2,
            })
            .await;
        drop(sender);

        process_events(rx, vec![recorder.clone() as Arc<dyn EventHandler>]).await;

        assert_eq!(
            *recorder.seen.lock().await,
            vec!["checkout_started", "checkout_aborted"]
        );
    }

    #[tokio::test]
    async fn full_channel_drops_without_blocking() {
        let (tx, _rx) = mpsc::channel(1);
        let sender = EventSender::new(tx);
        for payment_id in 0..3 {
            sender
                .send_or_log(Event::PaymentCaptured {
                    customer_id: 1,
                    payment_id,
                })
                .await;
        }
    }
}
