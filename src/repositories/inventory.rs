use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
};

use crate::entities::product::{self, Entity as Product, Model as ProductModel};
use crate::errors::ServiceError;

/// Per-product stock bookkeeping.
///
/// Both adjustments are single conditional updates so concurrent checkouts
/// over the same product cannot drive stock below zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryLedger;

impl InventoryLedger {
    pub async fn find_product<C>(
        &self,
        conn: &C,
        product_id: i32,
    ) -> Result<Option<ProductModel>, ServiceError>
    where
        C: ConnectionTrait,
    {
        Ok(Product::find_by_id(product_id).one(conn).await?)
    }

    pub async fn find_products<C>(
        &self,
        conn: &C,
        product_ids: &[i32],
    ) -> Result<Vec<ProductModel>, ServiceError>
    where
        C: ConnectionTrait,
    {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(Product::find()
            .filter(product::Column::ProductId.is_in(product_ids.iter().copied()))
            .order_by_asc(product::Column::ProductId)
            .all(conn)
            .await?)
    }

    /// Takes `quantity` units out of stock, failing with `InsufficientStock`
    /// when fewer remain.
    pub async fn decrease_stock<C>(
        &self,
        conn: &C,
        product_id: i32,
        quantity: i32,
    ) -> Result<(), ServiceError>
    where
        C: ConnectionTrait,
    {
        if quantity <= 0 {
            return Err(ServiceError::InvalidQuantity {
                product_id,
                quantity,
            });
        }

        let result = Product::update_many()
            .col_expr(
                product::Column::StockQuantity,
                Expr::col(product::Column::StockQuantity).sub(quantity),
            )
            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product::Column::ProductId.eq(product_id))
            .filter(product::Column::StockQuantity.gte(quantity))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::InsufficientStock {
                product_id,
                requested: quantity,
            });
        }
        Ok(())
    }

    /// Returns `quantity` units to stock.
    pub async fn increase_stock<C>(
        &self,
        conn: &C,
        product_id: i32,
        quantity: i32,
    ) -> Result<(), ServiceError>
    where
        C: ConnectionTrait,
    {
        if quantity <= 0 {
            return Err(ServiceError::InvalidQuantity {
                product_id,
                quantity,
            });
        }

        let result = Product::update_many()
            .col_expr(
                product::Column::StockQuantity,
                Expr::col(product::Column::StockQuantity).add(quantity),
            )
            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product::Column::ProductId.eq(product_id))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::ProductNotFound { product_id });
        }
        Ok(())
    }
}
