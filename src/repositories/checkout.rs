use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::entities::checkout_item::{self, Entity as CheckoutItem, Model as CheckoutItemModel};
use crate::entities::checkout_session::{
    self, Entity as CheckoutSession, Model as CheckoutSessionModel,
};
use crate::errors::ServiceError;

#[derive(Debug, Clone, Copy, Default)]
pub struct CheckoutRepository;

impl CheckoutRepository {
    pub async fn find_session<C>(
        &self,
        conn: &C,
        customer_id: i32,
    ) -> Result<Option<CheckoutSessionModel>, ServiceError>
    where
        C: ConnectionTrait,
    {
        Ok(CheckoutSession::find_by_id(customer_id).one(conn).await?)
    }

    /// Inserts the session row. The primary key on `customer_id` turns a
    /// concurrent second start into `SessionAlreadyExists`.
    pub async fn insert_session<C>(
        &self,
        conn: &C,
        customer_id: i32,
        amount: Decimal,
    ) -> Result<CheckoutSessionModel, ServiceError>
    where
        C: ConnectionTrait,
    {
        let now = Utc::now();
        let session = checkout_session::ActiveModel {
            customer_id: Set(customer_id),
            shipping_address: Set(None),
            payment_id: Set(None),
            amount: Set(amount),
            created_at: Set(now),
            updated_at: Set(now),
        };
        session.insert(conn).await.map_err(|e| {
            ServiceError::on_unique_violation(e, ServiceError::SessionAlreadyExists { customer_id })
        })
    }

    pub async fn insert_items<C>(
        &self,
        conn: &C,
        items: &[CheckoutItemModel],
    ) -> Result<(), ServiceError>
    where
        C: ConnectionTrait,
    {
        if items.is_empty() {
            return Ok(());
        }
        let rows = items.iter().map(|item| checkout_item::ActiveModel {
            customer_id: Set(item.customer_id),
            product_id: Set(item.product_id),
            quantity: Set(item.quantity),
            unit_price: Set(item.unit_price),
        });
        CheckoutItem::insert_many(rows).exec(conn).await?;
        Ok(())
    }

    pub async fn items<C>(
        &self,
        conn: &C,
        customer_id: i32,
    ) -> Result<Vec<CheckoutItemModel>, ServiceError>
    where
        C: ConnectionTrait,
    {
        Ok(CheckoutItem::find()
            .filter(checkout_item::Column::CustomerId.eq(customer_id))
            .order_by_asc(checkout_item::Column::ProductId)
            .all(conn)
            .await?)
    }

    pub async fn set_shipping_address<C>(
        &self,
        conn: &C,
        customer_id: i32,
        address: &str,
    ) -> Result<u64, ServiceError>
    where
        C: ConnectionTrait,
    {
        let result = CheckoutSession::update_many()
            .col_expr(
                checkout_session::Column::ShippingAddress,
                Expr::value(address.to_string()),
            )
            .col_expr(checkout_session::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(checkout_session::Column::CustomerId.eq(customer_id))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    /// Links `payment_id` to the session, but only while the session has no
    /// payment yet. Returns 0 when the session is gone or already carries a
    /// payment, so a concurrent attach cannot strand a payment row.
    pub async fn attach_payment<C>(
        &self,
        conn: &C,
        customer_id: i32,
        payment_id: i32,
    ) -> Result<u64, ServiceError>
    where
        C: ConnectionTrait,
    {
        let result = CheckoutSession::update_many()
            .col_expr(checkout_session::Column::PaymentId, Expr::value(payment_id))
            .col_expr(checkout_session::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(checkout_session::Column::CustomerId.eq(customer_id))
            .filter(checkout_session::Column::PaymentId.is_null())
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    /// Removes the snapshot and the session. Returns the number of session
    /// rows deleted, which is 0 when another request settled it first.
    pub async fn delete_session<C>(&self, conn: &C, customer_id: i32) -> Result<u64, ServiceError>
    where
        C: ConnectionTrait,
    {
        CheckoutItem::delete_many()
            .filter(checkout_item::Column::CustomerId.eq(customer_id))
            .exec(conn)
            .await?;
        let result = CheckoutSession::delete_by_id(customer_id).exec(conn).await?;
        Ok(result.rows_affected)
    }
}
