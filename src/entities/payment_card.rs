use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Stored card that digital payments are matched against.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Deserialize)]
#[sea_orm(table_name = "payment_cards")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub card_id: i32,
    pub holder_name: String,
    pub card_number: String,
    pub card_type: String,
    pub cvv: String,
    pub expiry_date: String,
    pub brand: String,
    pub created_at: DateTime<Utc>,
}

impl Model {
    /// Last four digits, the only part of the number safe to echo back.
    pub fn last_four(&self) -> &str {
        let len = self.card_number.len();
        self.card_number.get(len.saturating_sub(4)..).unwrap_or_default()
    }
}

/// Public view of a card; never carries the full number or the CVV.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CardSummary {
    pub card_id: i32,
    pub brand: String,
    pub card_type: String,
    pub last_four: String,
}

impl From<&Model> for CardSummary {
    fn from(card: &Model) -> Self {
        Self {
            card_id: card.card_id,
            brand: card.brand.clone(),
            card_type: card.card_type.clone(),
            last_four: card.last_four().to_string(),
        }
    }
}

/// Card details as presented by the customer. A digital payment is accepted
/// only when every field matches a stored card exactly.
#[derive(Clone, Debug, Deserialize, Validate, ToSchema)]
pub struct CardDetails {
    #[validate(length(min = 12, max = 19))]
    pub card_number: String,
    #[validate(length(min = 1))]
    pub card_type: String,
    #[validate(length(min = 3, max = 4))]
    pub cvv: String,
    #[validate(length(min = 4))]
    pub expiry_date: String,
    #[validate(length(min = 1))]
    pub brand: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::online_transaction::Entity")]
    OnlineTransaction,
}

impl Related<super::online_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OnlineTransaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
