pub mod commerce;
pub mod common;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::commerce::{
    BasketService, CheckoutService, DeliverySimulator, OrderService, PaymentService,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub basket: Arc<BasketService>,
    pub checkout: Arc<CheckoutService>,
    pub payments: Arc<PaymentService>,
    pub orders: Arc<OrderService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        simulator: Arc<DeliverySimulator>,
    ) -> Self {
        let orders = Arc::new(OrderService::new(
            db_pool.clone(),
            event_sender.clone(),
            simulator,
        ));
        Self {
            basket: Arc::new(BasketService::new(db_pool.clone(), event_sender.clone())),
            checkout: Arc::new(CheckoutService::new(
                db_pool.clone(),
                event_sender.clone(),
                orders.clone(),
            )),
            payments: Arc::new(PaymentService::new(db_pool, event_sender)),
            orders,
        }
    }
}
