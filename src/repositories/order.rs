use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};

use crate::entities::checkout_item::Model as CheckoutItemModel;
use crate::entities::customer_order::{
    self, Entity as CustomerOrder, Model as CustomerOrderModel, OrderStatus,
};
use crate::entities::order_item::{self, Entity as OrderItem, Model as OrderItemModel};
use crate::entities::order_simulation::{
    self, Entity as OrderSimulation, Model as OrderSimulationModel,
};
use crate::errors::ServiceError;

/// Fields of an order taken from a settled checkout session.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: i32,
    pub payment_id: i32,
    pub shipping_address: String,
    pub order_total: Decimal,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OrderRepository;

impl OrderRepository {
    pub async fn insert_order<C>(
        &self,
        conn: &C,
        order: NewOrder,
    ) -> Result<CustomerOrderModel, ServiceError>
    where
        C: ConnectionTrait,
    {
        let now = Utc::now();
        let row = customer_order::ActiveModel {
            customer_id: Set(order.customer_id),
            payment_id: Set(order.payment_id),
            shipping_address: Set(order.shipping_address),
            order_total: Set(order.order_total),
            order_status: Set(OrderStatus::Processing),
            estimated_delivery_date: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        Ok(row.insert(conn).await?)
    }

    pub async fn insert_items<C>(
        &self,
        conn: &C,
        order_id: i32,
        items: &[CheckoutItemModel],
    ) -> Result<(), ServiceError>
    where
        C: ConnectionTrait,
    {
        if items.is_empty() {
            return Ok(());
        }
        let rows = items.iter().map(|item| order_item::ActiveModel {
            order_id: Set(order_id),
            product_id: Set(item.product_id),
            quantity: Set(item.quantity),
            unit_price: Set(item.unit_price),
        });
        OrderItem::insert_many(rows).exec(conn).await?;
        Ok(())
    }

    pub async fn insert_simulation<C>(
        &self,
        conn: &C,
        order_id: i32,
        out_for_delivery_date: DateTime<Utc>,
        delivery_date: DateTime<Utc>,
    ) -> Result<OrderSimulationModel, ServiceError>
    where
        C: ConnectionTrait,
    {
        let row = order_simulation::ActiveModel {
            order_id: Set(order_id),
            out_for_delivery_date: Set(out_for_delivery_date),
            delivery_date: Set(delivery_date),
        };
        Ok(row.insert(conn).await?)
    }

    /// A customer's orders, newest first, each with its milestone dates.
    pub async fn orders_with_simulation<C>(
        &self,
        conn: &C,
        customer_id: i32,
    ) -> Result<Vec<(CustomerOrderModel, Option<OrderSimulationModel>)>, ServiceError>
    where
        C: ConnectionTrait,
    {
        Ok(CustomerOrder::find()
            .filter(customer_order::Column::CustomerId.eq(customer_id))
            .find_also_related(OrderSimulation)
            .order_by_desc(customer_order::Column::CreatedAt)
            .order_by_desc(customer_order::Column::OrderId)
            .all(conn)
            .await?)
    }

    pub async fn find_order<C>(
        &self,
        conn: &C,
        customer_id: i32,
        order_id: i32,
    ) -> Result<Option<(CustomerOrderModel, Option<OrderSimulationModel>)>, ServiceError>
    where
        C: ConnectionTrait,
    {
        Ok(CustomerOrder::find()
            .filter(customer_order::Column::OrderId.eq(order_id))
            .filter(customer_order::Column::CustomerId.eq(customer_id))
            .find_also_related(OrderSimulation)
            .one(conn)
            .await?)
    }

    pub async fn items<C>(&self, conn: &C, order_id: i32) -> Result<Vec<OrderItemModel>, ServiceError>
    where
        C: ConnectionTrait,
    {
        Ok(OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::ProductId)
            .all(conn)
            .await?)
    }

    /// Persists a status transition decided by the delivery simulator.
    pub async fn apply_status<C>(
        &self,
        conn: &C,
        order: &CustomerOrderModel,
        status: OrderStatus,
        estimated_delivery_date: Option<DateTime<Utc>>,
    ) -> Result<CustomerOrderModel, ServiceError>
    where
        C: ConnectionTrait,
    {
        let mut row: customer_order::ActiveModel = order.clone().into();
        row.order_status = Set(status);
        row.estimated_delivery_date = Set(estimated_delivery_date);
        row.updated_at = Set(Utc::now());
        Ok(row.update(conn).await?)
    }
}
