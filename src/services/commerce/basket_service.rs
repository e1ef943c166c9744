use crate::{
    entities::{BasketItemModel, ProductModel},
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::{BasketRepository, CheckoutRepository, InventoryLedger},
};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;

/// One basket line as shown to the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct BasketLine {
    pub product_id: i32,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub stock_quantity: i32,
    pub line_total: Decimal,
}

/// A basket quantity changed because stock moved since the line was added.
/// `new_quantity == 0` means the line was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QuantityCorrection {
    pub product_id: i32,
    pub old_quantity: i32,
    pub new_quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct BasketView {
    pub basket: Vec<BasketLine>,
    pub changes: Vec<QuantityCorrection>,
}

impl BasketView {
    pub fn total(&self) -> Decimal {
        self.basket.iter().map(|line| line.line_total).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuantityAdjustment {
    Increment,
    Decrement,
}

/// Clamps every line to the product's live stock.
///
/// This is the advisory check done on view. The hard gate is the stock
/// check inside checkout start; the two are kept separate on purpose.
pub fn reconcile(
    lines: Vec<(BasketItemModel, Option<ProductModel>)>,
) -> (Vec<BasketLine>, Vec<QuantityCorrection>) {
    let mut basket = Vec::with_capacity(lines.len());
    let mut changes = Vec::new();

    for (item, product) in lines {
        let Some(product) = product else {
            changes.push(QuantityCorrection {
                product_id: item.product_id,
                old_quantity: item.quantity,
                new_quantity: 0,
            });
            continue;
        };

        let available = product.stock_quantity.max(0);
        let quantity = item.quantity.min(available);
        if quantity != item.quantity {
            changes.push(QuantityCorrection {
                product_id: item.product_id,
                old_quantity: item.quantity,
                new_quantity: quantity,
            });
        }
        if quantity == 0 {
            continue;
        }

        basket.push(BasketLine {
            product_id: product.product_id,
            line_total: product.unit_price * Decimal::from(quantity),
            name: product.name,
            unit_price: product.unit_price,
            quantity,
            stock_quantity: product.stock_quantity,
        });
    }

    (basket, changes)
}

/// Basket store: per-customer product quantities, bounded by stock.
#[derive(Clone)]
pub struct BasketService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    baskets: BasketRepository,
    checkouts: CheckoutRepository,
    inventory: InventoryLedger,
}

impl BasketService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db,
            event_sender,
            baskets: BasketRepository,
            checkouts: CheckoutRepository,
            inventory: InventoryLedger,
        }
    }

    /// Returns the reconciled basket and the corrections applied. The
    /// corrections are written back in the background.
    #[instrument(skip(self))]
    pub async fn get_basket(&self, customer_id: i32) -> Result<BasketView, ServiceError> {
        let lines = self
            .baskets
            .items_with_products(&*self.db, customer_id)
            .await?;
        let (basket, changes) = reconcile(lines);

        if !changes.is_empty() {
            counter!("farmstand.basket.reconciled_lines", changes.len() as u64);
            info!(
                customer_id,
                corrected = changes.len(),
                "Basket reconciled against live stock"
            );

            let db = self.db.clone();
            let event_sender = self.event_sender.clone();
            let corrections = changes.clone();
            tokio::spawn(async move {
                match Self::persist_corrections(&*db, customer_id, &corrections).await {
                    Ok(written) => {
                        event_sender
                            .send_or_log(Event::BasketReconciled {
                                customer_id,
                                corrected_lines: written as usize,
                            })
                            .await;
                    }
                    Err(e) => error!(customer_id, "Failed to persist basket corrections: {}", e),
                }
            });
        }

        Ok(BasketView { basket, changes })
    }

    /// Writes corrections back. Each write only applies if the line still
    /// holds the quantity that was corrected, so a concurrent edit by the
    /// customer wins.
    pub async fn persist_corrections<C>(
        conn: &C,
        customer_id: i32,
        corrections: &[QuantityCorrection],
    ) -> Result<u64, ServiceError>
    where
        C: ConnectionTrait,
    {
        let baskets = BasketRepository;
        let mut written = 0;
        for correction in corrections {
            written += if correction.new_quantity == 0 {
                baskets
                    .delete_item_if(
                        conn,
                        customer_id,
                        correction.product_id,
                        correction.old_quantity,
                    )
                    .await?
            } else {
                baskets
                    .set_quantity_if(
                        conn,
                        customer_id,
                        correction.product_id,
                        correction.old_quantity,
                        correction.new_quantity,
                    )
                    .await?
            };
        }
        Ok(written)
    }

    /// Adds a product line. `quantity` defaults to 1.
    #[instrument(skip(self))]
    pub async fn add_product(
        &self,
        customer_id: i32,
        product_id: i32,
        quantity: Option<i32>,
    ) -> Result<BasketItemModel, ServiceError> {
        let quantity = quantity.unwrap_or(1);
        if quantity <= 0 {
            return Err(ServiceError::InvalidQuantity {
                product_id,
                quantity,
            });
        }

        let txn = self.db.begin().await?;
        self.ensure_no_checkout(&txn, customer_id).await?;

        let product = self
            .inventory
            .find_product(&txn, product_id)
            .await?
            .ok_or(ServiceError::ProductNotFound { product_id })?;

        if product.stock_quantity <= 0 {
            warn!(customer_id, product_id, "Product is out of stock");
            return Err(ServiceError::OutOfStock { product_id });
        }

        if self
            .baskets
            .find_item(&txn, customer_id, product_id)
            .await?
            .is_some()
        {
            return Err(ServiceError::DuplicateItem { product_id });
        }

        if quantity > product.stock_quantity {
            return Err(ServiceError::ExceedsStock {
                product_id,
                requested: quantity,
                available: product.stock_quantity,
            });
        }

        let item = self
            .baskets
            .insert_item(&txn, customer_id, product_id, quantity)
            .await?;
        txn.commit().await?;

        info!(customer_id, product_id, quantity, "Added product to basket");
        Ok(item)
    }

    #[instrument(skip(self))]
    pub async fn remove_product(&self, customer_id: i32, product_id: i32) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        self.ensure_no_checkout(&txn, customer_id).await?;

        if self.baskets.delete_item(&txn, customer_id, product_id).await? == 0 {
            return Err(ServiceError::BasketItemNotFound { product_id });
        }
        txn.commit().await?;

        info!(customer_id, product_id, "Removed product from basket");
        Ok(())
    }

    /// Sets a line's quantity. Zero deletes the line and yields `None`.
    #[instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        customer_id: i32,
        product_id: i32,
        quantity: i32,
    ) -> Result<Option<BasketItemModel>, ServiceError> {
        if quantity < 0 {
            return Err(ServiceError::InvalidQuantity {
                product_id,
                quantity,
            });
        }

        let txn = self.db.begin().await?;
        self.ensure_no_checkout(&txn, customer_id).await?;
        let current = self
            .baskets
            .find_item(&txn, customer_id, product_id)
            .await?
            .ok_or(ServiceError::BasketItemNotFound { product_id })?;

        let updated = self.write_quantity(&txn, current, quantity).await?;
        txn.commit().await?;
        Ok(updated)
    }

    /// Moves a line's quantity by one in either direction. Decrementing a
    /// line of 1 removes it.
    #[instrument(skip(self))]
    pub async fn adjust_quantity(
        &self,
        customer_id: i32,
        product_id: i32,
        adjustment: QuantityAdjustment,
    ) -> Result<Option<BasketItemModel>, ServiceError> {
        let txn = self.db.begin().await?;
        self.ensure_no_checkout(&txn, customer_id).await?;
        let current = self
            .baskets
            .find_item(&txn, customer_id, product_id)
            .await?
            .ok_or(ServiceError::BasketItemNotFound { product_id })?;

        let quantity = match adjustment {
            QuantityAdjustment::Increment => current.quantity.checked_add(1),
            QuantityAdjustment::Decrement => current.quantity.checked_sub(1),
        }
        .ok_or(ServiceError::InvalidQuantity {
            product_id,
            quantity: current.quantity,
        })?;
        let updated = self.write_quantity(&txn, current, quantity).await?;
        txn.commit().await?;
        Ok(updated)
    }

    #[instrument(skip(self))]
    pub async fn clear_basket(&self, customer_id: i32) -> Result<u64, ServiceError> {
        let txn = self.db.begin().await?;
        self.ensure_no_checkout(&txn, customer_id).await?;
        let removed = self.baskets.clear(&txn, customer_id).await?;
        txn.commit().await?;

        info!(customer_id, removed, "Cleared basket");
        Ok(removed)
    }

    async fn write_quantity<C>(
        &self,
        conn: &C,
        current: BasketItemModel,
        quantity: i32,
    ) -> Result<Option<BasketItemModel>, ServiceError>
    where
        C: ConnectionTrait,
    {
        let (customer_id, product_id) = (current.customer_id, current.product_id);

        if quantity == 0 {
            self.baskets.delete_item(conn, customer_id, product_id).await?;
            info!(customer_id, product_id, "Basket line dropped to zero and removed");
            return Ok(None);
        }

        let product = self
            .inventory
            .find_product(conn, product_id)
            .await?
            .ok_or(ServiceError::ProductNotFound { product_id })?;
        if quantity > product.stock_quantity {
            return Err(ServiceError::ExceedsStock {
                product_id,
                requested: quantity,
                available: product.stock_quantity,
            });
        }

        self.baskets
            .set_quantity(conn, customer_id, product_id, quantity)
            .await?;
        info!(customer_id, product_id, quantity, "Updated basket quantity");

        Ok(Some(BasketItemModel {
            quantity,
            ..current
        }))
    }

    /// A basket is frozen while its contents sit in a checkout session.
    async fn ensure_no_checkout<C>(&self, conn: &C, customer_id: i32) -> Result<(), ServiceError>
    where
        C: ConnectionTrait,
    {
        if self.checkouts.find_session(conn, customer_id).await?.is_some() {
            warn!(customer_id, "Basket change rejected while checkout is in progress");
            return Err(ServiceError::CheckoutInProgress { customer_id });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(product_id: i32, quantity: i32) -> BasketItemModel {
        BasketItemModel {
            customer_id: 1,
            product_id,
            quantity,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn product(product_id: i32, stock: i32) -> ProductModel {
        ProductModel {
            product_id,
            store_id: 1,
            name: format!("Product {}", product_id),
            category: "vegetables".into(),
            unit_price: Decimal::new(250, 2),
            stock_quantity: stock,
            average_rating: Decimal::ZERO,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn lines_within_stock_are_untouched() {
        let (basket, changes) = reconcile(vec![(item(1, 3), Some(product(1, 10)))]);
        assert!(changes.is_empty());
        assert_eq!(basket.len(), 1);
        assert_eq!(basket[0].quantity, 3);
        assert_eq!(basket[0].line_total, Decimal::new(750, 2));
    }

    #[test]
    fn lines_above_stock_are_clamped() {
        let (basket, changes) = reconcile(vec![(item(1, 35), Some(product(1, 29)))]);
        assert_eq!(
            changes,
            vec![QuantityCorrection {
                product_id: 1,
                old_quantity: 35,
                new_quantity: 29
            }]
        );
        assert_eq!(basket[0].quantity, 29);
    }

    #[test]
    fn sold_out_lines_are_dropped() {
        let (basket, changes) = reconcile(vec![
            (item(1, 2), Some(product(1, 0))),
            (item(2, 1), Some(product(2, 5))),
        ]);
        assert_eq!(basket.len(), 1);
        assert_eq!(basket[0].product_id, 2);
        assert_eq!(changes[0].new_quantity, 0);
    }

    #[test]
    fn view_total_sums_lines() {
        let (basket, changes) = reconcile(vec![
            (item(1, 2), Some(product(1, 5))),
            (item(2, 4), Some(product(2, 5))),
        ]);
        let view = BasketView { basket, changes };
        assert_eq!(view.total(), Decimal::new(1500, 2));
    }
}
