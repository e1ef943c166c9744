use crate::{
    entities::{
        CheckoutSessionModel, CustomerOrderModel, OrderItemModel, OrderSimulationModel,
    },
    errors::{ServiceError, SessionField},
    events::{Event, EventSender},
    repositories::{CheckoutRepository, NewOrder, OrderRepository},
    services::commerce::delivery_simulator::{next_status, DeliverySimulator},
};
use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// An order with its item snapshot and milestone dates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: CustomerOrderModel,
    pub items: Vec<OrderItemModel>,
    pub out_for_delivery_date: Option<DateTime<Utc>>,
    pub delivery_date: Option<DateTime<Utc>>,
}

impl OrderDetails {
    fn new(
        order: CustomerOrderModel,
        items: Vec<OrderItemModel>,
        milestones: Option<&OrderSimulationModel>,
    ) -> Self {
        Self {
            order,
            items,
            out_for_delivery_date: milestones.map(|m| m.out_for_delivery_date),
            delivery_date: milestones.map(|m| m.delivery_date),
        }
    }
}

/// Order settlement and the lazily evaluated delivery lifecycle.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    simulator: Arc<DeliverySimulator>,
    orders: OrderRepository,
    checkouts: CheckoutRepository,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        simulator: Arc<DeliverySimulator>,
    ) -> Self {
        Self {
            db,
            event_sender,
            simulator,
            orders: OrderRepository,
            checkouts: CheckoutRepository,
        }
    }

    /// Settles the customer's checkout session into an order.
    #[instrument(skip(self))]
    pub async fn create_order(&self, customer_id: i32) -> Result<OrderDetails, ServiceError> {
        let txn = self.db.begin().await?;
        let session = self
            .checkouts
            .find_session(&txn, customer_id)
            .await?
            .ok_or(ServiceError::NoActiveSession { customer_id })?;
        let details = self.settle_session(&txn, &session).await?;
        txn.commit().await?;

        let order = &details.order;
        counter!("farmstand.checkout.settled", 1);
        info!(
            customer_id,
            order_id = order.order_id,
            total = %order.order_total,
            "Checkout settled into order"
        );
        self.event_sender
            .send_or_log(Event::OrderCreated {
                customer_id,
                order_id: order.order_id,
                total: order.order_total,
            })
            .await;

        Ok(details)
    }

    /// Turns a previously read session into an order on `conn`.
    ///
    /// The session delete is the gate: when another transaction already
    /// removed the row (a concurrent settle or abort) nothing is written and
    /// `NoActiveSession` is returned, so the caller's transaction rolls back.
    pub async fn settle_session<C>(
        &self,
        conn: &C,
        session: &CheckoutSessionModel,
    ) -> Result<OrderDetails, ServiceError>
    where
        C: ConnectionTrait,
    {
        let customer_id = session.customer_id;
        let (shipping_address, payment_id) = match (&session.shipping_address, session.payment_id)
        {
            (Some(address), Some(payment_id)) => (address.clone(), payment_id),
            (address, payment_id) => {
                let mut missing = Vec::new();
                if address.is_none() {
                    missing.push(SessionField::ShippingAddress);
                }
                if payment_id.is_none() {
                    missing.push(SessionField::Payment);
                }
                warn!(customer_id, ?missing, "Checkout is not ready to settle");
                return Err(ServiceError::CheckoutIncomplete { missing });
            }
        };

        let items = self.checkouts.items(conn, customer_id).await?;
        if self.checkouts.delete_session(conn, customer_id).await? == 0 {
            warn!(customer_id, "Checkout session was removed before settlement");
            return Err(ServiceError::NoActiveSession { customer_id });
        }

        let order = self
            .orders
            .insert_order(
                conn,
                NewOrder {
                    customer_id,
                    payment_id,
                    shipping_address,
                    order_total: session.amount,
                },
            )
            .await?;
        self.orders.insert_items(conn, order.order_id, &items).await?;

        let milestones = self.simulator.schedule(order.created_at);
        let simulation = self
            .orders
            .insert_simulation(
                conn,
                order.order_id,
                milestones.out_for_delivery_date,
                milestones.delivery_date,
            )
            .await?;
        let order_items = self.orders.items(conn, order.order_id).await?;

        Ok(OrderDetails::new(order, order_items, Some(&simulation)))
    }

    /// The customer's orders, newest first, with statuses brought up to date.
    pub async fn list_orders(&self, customer_id: i32) -> Result<Vec<CustomerOrderModel>, ServiceError> {
        self.list_orders_at(customer_id, Utc::now()).await
    }

    #[instrument(skip(self))]
    pub async fn list_orders_at(
        &self,
        customer_id: i32,
        now: DateTime<Utc>,
    ) -> Result<Vec<CustomerOrderModel>, ServiceError> {
        let txn = self.db.begin().await?;
        let rows = self.orders.orders_with_simulation(&txn, customer_id).await?;

        let mut orders = Vec::with_capacity(rows.len());
        let mut changes = Vec::new();
        for (order, milestones) in rows {
            let (order, change) = self.refresh(&txn, order, milestones.as_ref(), now).await?;
            changes.extend(change);
            orders.push(order);
        }
        txn.commit().await?;

        self.publish_status_changes(changes).await;
        Ok(orders)
    }

    pub async fn get_order(&self, customer_id: i32, order_id: i32) -> Result<OrderDetails, ServiceError> {
        self.get_order_at(customer_id, order_id, Utc::now()).await
    }

    #[instrument(skip(self))]
    pub async fn get_order_at(
        &self,
        customer_id: i32,
        order_id: i32,
        now: DateTime<Utc>,
    ) -> Result<OrderDetails, ServiceError> {
        let txn = self.db.begin().await?;
        let (order, milestones) = self
            .orders
            .find_order(&txn, customer_id, order_id)
            .await?
            .ok_or(ServiceError::OrderNotFound { order_id })?;

        let (order, change) = self.refresh(&txn, order, milestones.as_ref(), now).await?;
        let items = self.orders.items(&txn, order_id).await?;
        txn.commit().await?;

        self.publish_status_changes(change.into_iter().collect()).await;
        Ok(OrderDetails::new(order, items, milestones.as_ref()))
    }

    /// Applies the delivery rule to one order inside the caller's transaction.
    async fn refresh<C>(
        &self,
        conn: &C,
        order: CustomerOrderModel,
        milestones: Option<&OrderSimulationModel>,
        now: DateTime<Utc>,
    ) -> Result<(CustomerOrderModel, Option<Event>), ServiceError>
    where
        C: ConnectionTrait,
    {
        let Some(milestones) = milestones else {
            return Ok((order, None));
        };
        let Some(change) = next_status(&order, milestones, now) else {
            return Ok((order, None));
        };

        let old_status = order.order_status;
        let updated = self
            .orders
            .apply_status(conn, &order, change.status, change.estimated_delivery_date)
            .await?;

        Ok((
            updated,
            Some(Event::OrderStatusChanged {
                order_id: order.order_id,
                old_status,
                new_status: change.status,
                at: now,
            }),
        ))
    }

    async fn publish_status_changes(&self, changes: Vec<Event>) {
        for event in changes {
            if let Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
                ..
            } = &event
            {
                counter!("farmstand.orders.status_transitions", 1);
                info!(
                    order_id,
                    from = old_status.as_str(),
                    to = new_status.as_str(),
                    "Order status advanced"
                );
            }
            self.event_sender.send_or_log(event).await;
        }
    }
}
