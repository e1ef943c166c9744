use crate::{
    entities::{CheckoutItemModel, CheckoutSessionModel, PaymentStatus},
    errors::{ServiceError, StockShortfall},
    events::{Event, EventSender},
    repositories::{BasketRepository, CheckoutRepository, InventoryLedger, PaymentRepository},
    services::commerce::order_service::{OrderDetails, OrderService},
};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// The active session together with its item snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutView {
    #[serde(flatten)]
    pub session: CheckoutSessionModel,
    pub items: Vec<CheckoutItemModel>,
}

/// Checkout orchestrator.
///
/// Moves basket contents into a reserved session and back, and hands a
/// complete session to order settlement. Start and abort are exact mirrors
/// of each other: the same quantities leave and re-enter stock.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    order_service: Arc<OrderService>,
    baskets: BasketRepository,
    checkouts: CheckoutRepository,
    inventory: InventoryLedger,
    payments: PaymentRepository,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        order_service: Arc<OrderService>,
    ) -> Self {
        Self {
            db,
            event_sender,
            order_service,
            baskets: BasketRepository,
            checkouts: CheckoutRepository,
            inventory: InventoryLedger,
            payments: PaymentRepository,
        }
    }

    /// Reserves the basket: snapshots it into a new session, takes the
    /// quantities out of stock and empties the basket, all or nothing.
    #[instrument(skip(self))]
    pub async fn start_checkout(&self, customer_id: i32) -> Result<CheckoutView, ServiceError> {
        let txn = self.db.begin().await?;

        if self
            .checkouts
            .find_session(&txn, customer_id)
            .await?
            .is_some()
        {
            return Err(ServiceError::SessionAlreadyExists { customer_id });
        }

        let lines = self.baskets.items_with_products(&txn, customer_id).await?;
        if lines.is_empty() {
            return Err(ServiceError::EmptyBasket);
        }

        let conflicts: Vec<StockShortfall> = lines
            .iter()
            .filter_map(|(item, product)| {
                let available = product.as_ref().map_or(0, |p| p.stock_quantity);
                (item.quantity > available).then_some(StockShortfall {
                    product_id: item.product_id,
                    requested: item.quantity,
                    available,
                })
            })
            .collect();
        if !conflicts.is_empty() {
            warn!(
                customer_id,
                conflicting = conflicts.len(),
                "Checkout blocked by stock conflicts"
            );
            return Err(ServiceError::StockConflict { conflicts });
        }

        let mut items = Vec::with_capacity(lines.len());
        for (item, product) in &lines {
            let product = product.as_ref().ok_or(ServiceError::ProductNotFound {
                product_id: item.product_id,
            })?;
            items.push(CheckoutItemModel {
                customer_id,
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: product.unit_price,
            });
        }
        let amount: Decimal = items
            .iter()
            .map(|item| item.unit_price * Decimal::from(item.quantity))
            .sum();

        let session = self
            .checkouts
            .insert_session(&txn, customer_id, amount)
            .await?;
        self.checkouts.insert_items(&txn, &items).await?;
        for item in &items {
            self.inventory
                .decrease_stock(&txn, item.product_id, item.quantity)
                .await?;
        }
        self.baskets.clear(&txn, customer_id).await?;

        txn.commit().await?;

        counter!("farmstand.checkout.started", 1);
        info!(customer_id, %amount, lines = items.len(), "Checkout started");
        self.event_sender
            .send_or_log(Event::CheckoutStarted {
                customer_id,
                amount,
                line_count: items.len(),
            })
            .await;

        Ok(CheckoutView { session, items })
    }

    #[instrument(skip(self))]
    pub async fn get_checkout(&self, customer_id: i32) -> Result<CheckoutView, ServiceError> {
        let txn = self.db.begin().await?;
        let session = self
            .checkouts
            .find_session(&txn, customer_id)
            .await?
            .ok_or(ServiceError::NoActiveSession { customer_id })?;
        let items = self.checkouts.items(&txn, customer_id).await?;
        txn.commit().await?;

        Ok(CheckoutView { session, items })
    }

    /// Compensates `start_checkout`: every reserved line goes back into the
    /// basket and into stock, and a still-pending payment is discarded.
    /// Returns the restored lines.
    #[instrument(skip(self))]
    pub async fn abort_checkout(
        &self,
        customer_id: i32,
    ) -> Result<Vec<CheckoutItemModel>, ServiceError> {
        let txn = self.db.begin().await?;
        let session = self
            .checkouts
            .find_session(&txn, customer_id)
            .await?
            .ok_or(ServiceError::NoSessionToAbort { customer_id })?;
        let items = self.release_session(&txn, &session).await?;
        txn.commit().await?;

        counter!("farmstand.checkout.aborted", 1);
        info!(customer_id, restored = items.len(), "Checkout aborted");
        self.event_sender
            .send_or_log(Event::CheckoutAborted {
                customer_id,
                restored_lines: items.len(),
            })
            .await;

        Ok(items)
    }

    /// Undoes the reservation of a previously read session on `conn`.
    ///
    /// The session row is deleted before anything is restored. When another
    /// transaction already removed it (a concurrent settle or abort) nothing
    /// is written and `NoSessionToAbort` is returned.
    pub async fn release_session<C>(
        &self,
        conn: &C,
        session: &CheckoutSessionModel,
    ) -> Result<Vec<CheckoutItemModel>, ServiceError>
    where
        C: ConnectionTrait,
    {
        let customer_id = session.customer_id;
        let items = self.checkouts.items(conn, customer_id).await?;
        if self.checkouts.delete_session(conn, customer_id).await? == 0 {
            warn!(customer_id, "Checkout session was removed before abort");
            return Err(ServiceError::NoSessionToAbort { customer_id });
        }

        for item in &items {
            self.baskets
                .restore_line(conn, customer_id, item.product_id, item.quantity)
                .await?;
            self.inventory
                .increase_stock(conn, item.product_id, item.quantity)
                .await?;
        }

        if let Some(payment_id) = session.payment_id {
            match self.payments.find(conn, payment_id).await? {
                Some(payment) if payment.status == PaymentStatus::Pending => {
                    self.payments.delete(conn, payment_id).await?;
                }
                Some(payment) => warn!(
                    customer_id,
                    payment_id,
                    status = ?payment.status,
                    "Keeping non-pending payment of aborted checkout"
                ),
                None => {}
            }
        }

        Ok(items)
    }

    #[instrument(skip(self, address))]
    pub async fn set_shipping_address(
        &self,
        customer_id: i32,
        address: &str,
    ) -> Result<CheckoutSessionModel, ServiceError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(ServiceError::EmptyAddress);
        }

        let txn = self.db.begin().await?;
        if self
            .checkouts
            .set_shipping_address(&txn, customer_id, address)
            .await?
            == 0
        {
            return Err(ServiceError::NoActiveSession { customer_id });
        }
        let session = self
            .checkouts
            .find_session(&txn, customer_id)
            .await?
            .ok_or(ServiceError::NoActiveSession { customer_id })?;
        txn.commit().await?;

        info!(customer_id, "Shipping address set");
        Ok(session)
    }

    /// Settles a complete session into an order.
    pub async fn complete_checkout(&self, customer_id: i32) -> Result<OrderDetails, ServiceError> {
        self.order_service.create_order(customer_id).await
    }
}
