use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, Set,
};

use crate::entities::online_transaction::{
    self, Entity as OnlineTransaction, Model as OnlineTransactionModel,
};
use crate::entities::payment::{
    self, Entity as Payment, Model as PaymentModel, PaymentMethod, PaymentStatus,
};
use crate::entities::payment_card::{
    self, CardDetails, Entity as PaymentCard, Model as PaymentCardModel,
};
use crate::errors::ServiceError;

#[derive(Debug, Clone, Copy, Default)]
pub struct PaymentRepository;

impl PaymentRepository {
    pub async fn find<C>(&self, conn: &C, payment_id: i32) -> Result<Option<PaymentModel>, ServiceError>
    where
        C: ConnectionTrait,
    {
        Ok(Payment::find_by_id(payment_id).one(conn).await?)
    }

    /// Creates a pending payment.
    pub async fn insert<C>(
        &self,
        conn: &C,
        customer_id: i32,
        method: PaymentMethod,
        amount: Decimal,
    ) -> Result<PaymentModel, ServiceError>
    where
        C: ConnectionTrait,
    {
        let now = Utc::now();
        let payment = payment::ActiveModel {
            customer_id: Set(customer_id),
            method: Set(method),
            status: Set(PaymentStatus::Pending),
            amount: Set(amount),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        };
        Ok(payment.insert(conn).await?)
    }

    pub async fn set_method<C>(
        &self,
        conn: &C,
        payment_id: i32,
        method: PaymentMethod,
    ) -> Result<u64, ServiceError>
    where
        C: ConnectionTrait,
    {
        let result = Payment::update_many()
            .col_expr(payment::Column::Method, Expr::value(method))
            .col_expr(payment::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(payment::Column::PaymentId.eq(payment_id))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    /// Moves a payment from `from` to `to`. Returns 0 when the payment is no
    /// longer in `from`.
    pub async fn transition_status<C>(
        &self,
        conn: &C,
        payment_id: i32,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> Result<u64, ServiceError>
    where
        C: ConnectionTrait,
    {
        let result = Payment::update_many()
            .col_expr(payment::Column::Status, Expr::value(to))
            .col_expr(payment::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(payment::Column::PaymentId.eq(payment_id))
            .filter(payment::Column::Status.eq(from))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    /// Deletes a payment together with its online transactions.
    pub async fn delete<C>(&self, conn: &C, payment_id: i32) -> Result<u64, ServiceError>
    where
        C: ConnectionTrait,
    {
        self.delete_transactions(conn, payment_id).await?;
        let result = Payment::delete_by_id(payment_id).exec(conn).await?;
        Ok(result.rows_affected)
    }

    /// Exact match on every presented card field.
    pub async fn find_card<C>(
        &self,
        conn: &C,
        card: &CardDetails,
    ) -> Result<Option<PaymentCardModel>, ServiceError>
    where
        C: ConnectionTrait,
    {
        Ok(PaymentCard::find()
            .filter(payment_card::Column::CardNumber.eq(card.card_number.as_str()))
            .filter(payment_card::Column::CardType.eq(card.card_type.as_str()))
            .filter(payment_card::Column::Cvv.eq(card.cvv.as_str()))
            .filter(payment_card::Column::ExpiryDate.eq(card.expiry_date.as_str()))
            .filter(payment_card::Column::Brand.eq(card.brand.as_str()))
            .one(conn)
            .await?)
    }

    pub async fn insert_card<C>(
        &self,
        conn: &C,
        holder_name: &str,
        card: &CardDetails,
    ) -> Result<PaymentCardModel, ServiceError>
    where
        C: ConnectionTrait,
    {
        let row = payment_card::ActiveModel {
            holder_name: Set(holder_name.to_string()),
            card_number: Set(card.card_number.clone()),
            card_type: Set(card.card_type.clone()),
            cvv: Set(card.cvv.clone()),
            expiry_date: Set(card.expiry_date.clone()),
            brand: Set(card.brand.clone()),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        Ok(row.insert(conn).await?)
    }

    pub async fn transaction_exists<C>(
        &self,
        conn: &C,
        card_id: i32,
        payment_id: i32,
    ) -> Result<bool, ServiceError>
    where
        C: ConnectionTrait,
    {
        let count = OnlineTransaction::find()
            .filter(online_transaction::Column::CardId.eq(card_id))
            .filter(online_transaction::Column::PaymentId.eq(payment_id))
            .count(conn)
            .await?;
        Ok(count > 0)
    }

    pub async fn delete_transactions<C>(&self, conn: &C, payment_id: i32) -> Result<u64, ServiceError>
    where
        C: ConnectionTrait,
    {
        let result = OnlineTransaction::delete_many()
            .filter(online_transaction::Column::PaymentId.eq(payment_id))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    /// Records that `card_id` was charged for `payment_id`. The unique index
    /// on the pair turns a duplicate submission into
    /// `TransactionAlreadyRecorded`.
    pub async fn insert_transaction<C>(
        &self,
        conn: &C,
        card_id: i32,
        payment_id: i32,
    ) -> Result<OnlineTransactionModel, ServiceError>
    where
        C: ConnectionTrait,
    {
        let row = online_transaction::ActiveModel {
            payment_id: Set(payment_id),
            card_id: Set(card_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        };
        row.insert(conn).await.map_err(|e| {
            ServiceError::on_unique_violation(
                e,
                ServiceError::TransactionAlreadyRecorded {
                    card_id,
                    payment_id,
                },
            )
        })
    }
}
