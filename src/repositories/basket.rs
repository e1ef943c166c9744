use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::entities::basket_item::{self, Entity as BasketItem, Model as BasketItemModel};
use crate::entities::product::{Entity as Product, Model as ProductModel};
use crate::errors::ServiceError;

#[derive(Debug, Clone, Copy, Default)]
pub struct BasketRepository;

impl BasketRepository {
    /// Basket lines in the order they were added.
    pub async fn items<C>(
        &self,
        conn: &C,
        customer_id: i32,
    ) -> Result<Vec<BasketItemModel>, ServiceError>
    where
        C: ConnectionTrait,
    {
        Ok(BasketItem::find()
            .filter(basket_item::Column::CustomerId.eq(customer_id))
            .order_by_asc(basket_item::Column::CreatedAt)
            .order_by_asc(basket_item::Column::ProductId)
            .all(conn)
            .await?)
    }

    /// Basket lines joined with the live product row.
    pub async fn items_with_products<C>(
        &self,
        conn: &C,
        customer_id: i32,
    ) -> Result<Vec<(BasketItemModel, Option<ProductModel>)>, ServiceError>
    where
        C: ConnectionTrait,
    {
        Ok(BasketItem::find()
            .filter(basket_item::Column::CustomerId.eq(customer_id))
            .find_also_related(Product)
            .order_by_asc(basket_item::Column::CreatedAt)
            .order_by_asc(basket_item::Column::ProductId)
            .all(conn)
            .await?)
    }

    pub async fn find_item<C>(
        &self,
        conn: &C,
        customer_id: i32,
        product_id: i32,
    ) -> Result<Option<BasketItemModel>, ServiceError>
    where
        C: ConnectionTrait,
    {
        Ok(BasketItem::find_by_id((customer_id, product_id))
            .one(conn)
            .await?)
    }

    pub async fn insert_item<C>(
        &self,
        conn: &C,
        customer_id: i32,
        product_id: i32,
        quantity: i32,
    ) -> Result<BasketItemModel, ServiceError>
    where
        C: ConnectionTrait,
    {
        let now = Utc::now();
        let item = basket_item::ActiveModel {
            customer_id: Set(customer_id),
            product_id: Set(product_id),
            quantity: Set(quantity),
            created_at: Set(now),
            updated_at: Set(now),
        };
        item.insert(conn)
            .await
            .map_err(|e| ServiceError::on_unique_violation(e, ServiceError::DuplicateItem { product_id }))
    }

    /// Overwrites a line's quantity. Returns the number of rows touched.
    pub async fn set_quantity<C>(
        &self,
        conn: &C,
        customer_id: i32,
        product_id: i32,
        quantity: i32,
    ) -> Result<u64, ServiceError>
    where
        C: ConnectionTrait,
    {
        let result = BasketItem::update_many()
            .col_expr(basket_item::Column::Quantity, Expr::value(quantity))
            .col_expr(basket_item::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(basket_item::Column::CustomerId.eq(customer_id))
            .filter(basket_item::Column::ProductId.eq(product_id))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    /// Overwrites a line's quantity only if it still holds `expected`.
    pub async fn set_quantity_if<C>(
        &self,
        conn: &C,
        customer_id: i32,
        product_id: i32,
        expected: i32,
        quantity: i32,
    ) -> Result<u64, ServiceError>
    where
        C: ConnectionTrait,
    {
        let result = BasketItem::update_many()
            .col_expr(basket_item::Column::Quantity, Expr::value(quantity))
            .col_expr(basket_item::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(basket_item::Column::CustomerId.eq(customer_id))
            .filter(basket_item::Column::ProductId.eq(product_id))
            .filter(basket_item::Column::Quantity.eq(expected))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn delete_item<C>(
        &self,
        conn: &C,
        customer_id: i32,
        product_id: i32,
    ) -> Result<u64, ServiceError>
    where
        C: ConnectionTrait,
    {
        let result = BasketItem::delete_by_id((customer_id, product_id))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    /// Deletes a line only if it still holds `expected`.
    pub async fn delete_item_if<C>(
        &self,
        conn: &C,
        customer_id: i32,
        product_id: i32,
        expected: i32,
    ) -> Result<u64, ServiceError>
    where
        C: ConnectionTrait,
    {
        let result = BasketItem::delete_many()
            .filter(basket_item::Column::CustomerId.eq(customer_id))
            .filter(basket_item::Column::ProductId.eq(product_id))
            .filter(basket_item::Column::Quantity.eq(expected))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn clear<C>(&self, conn: &C, customer_id: i32) -> Result<u64, ServiceError>
    where
        C: ConnectionTrait,
    {
        let result = BasketItem::delete_many()
            .filter(basket_item::Column::CustomerId.eq(customer_id))
            .exec(conn)
            .await?;
        Ok(result.rows_affected)
    }

    /// Puts `quantity` units back into the basket, adding to any line the
    /// customer created in the meantime.
    pub async fn restore_line<C>(
        &self,
        conn: &C,
        customer_id: i32,
        product_id: i32,
        quantity: i32,
    ) -> Result<(), ServiceError>
    where
        C: ConnectionTrait,
    {
        match self.find_item(conn, customer_id, product_id).await? {
            Some(existing) => {
                let restored = existing.quantity.checked_add(quantity).ok_or(
                    ServiceError::InvalidQuantity {
                        product_id,
                        quantity,
                    },
                )?;
                self.set_quantity(conn, customer_id, product_id, restored)
                    .await?;
            }
            None => {
                self.insert_item(conn, customer_id, product_id, quantity)
                    .await?;
            }
        }
        Ok(())
    }
}
