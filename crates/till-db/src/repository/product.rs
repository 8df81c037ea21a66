//! # Product Repository
//!
//! Catalog lookups. The sale engine reads a product once, when an item is
//! added, and snapshots its name and price into the line item; completed
//! sales never consult the catalog again.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::{DbError, DbResult};
use till_core::Product;

/// Repository for product catalog operations.
pub struct ProductRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ProductRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        ProductRepository { conn }
    }

    /// Inserts a product.
    ///
    /// ## Errors
    /// `UniqueViolation` if the SKU already exists for the business.
    pub async fn insert(&mut self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, business_id, sku, name, price_cents, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&product.id)
        .bind(&product.business_id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Gets a product by ID within a business.
    pub async fn get(&mut self, business_id: &str, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE id = ?1 AND business_id = ?2",
        )
        .bind(id)
        .bind(business_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(product)
    }

    /// Changes a product's price. Existing line items keep their snapshot.
    pub async fn update_price(
        &mut self,
        business_id: &str,
        id: &str,
        price_cents: i64,
        now: DateTime<Utc>,
    ) -> DbResult<Product> {
        debug!(id = %id, price_cents, "Updating product price");

        sqlx::query_as::<_, Product>(
            r#"
            UPDATE products SET price_cents = ?1, updated_at = ?2
            WHERE id = ?3 AND business_id = ?4
            RETURNING *
            "#,
        )
        .bind(price_cents)
        .bind(now)
        .bind(id)
        .bind(business_id)
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or_else(|| DbError::not_found("Product", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;

    #[tokio::test]
    async fn test_get_is_business_scoped() {
        let db = fixtures::database().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = ProductRepository::new(&mut conn);

        let product = repo.get(fixtures::BUSINESS, fixtures::TRACKED).await.unwrap().unwrap();
        assert_eq!(product.price_cents, 1500);
        assert!(repo.get("other-biz", fixtures::TRACKED).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = fixtures::database().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = ProductRepository::new(&mut conn);

        let mut copy = repo.get(fixtures::BUSINESS, fixtures::TRACKED).await.unwrap().unwrap();
        copy.id = "prod-cola-2".to_string();

        let err = repo.insert(&copy).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_update_price() {
        let db = fixtures::database().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = ProductRepository::new(&mut conn);

        let updated = repo
            .update_price(fixtures::BUSINESS, fixtures::TRACKED, 1750, Utc::now())
            .await
            .unwrap();
        assert_eq!(updated.price_cents, 1750);
        assert!(repo
            .update_price(fixtures::BUSINESS, "missing", 1, Utc::now())
            .await
            .is_err());
    }
}
