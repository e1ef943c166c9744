use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A customer's single in-flight checkout.
///
/// `customer_id` is the primary key, so the table itself refuses a second
/// concurrent session for the same customer.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "checkout_sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub customer_id: i32,
    pub shipping_address: Option<String>,
    pub payment_id: Option<i32>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::checkout_item::Entity")]
    CheckoutItem,
}

impl Related<super::checkout_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CheckoutItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
