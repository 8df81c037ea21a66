//! # Inventory Repository
//!
//! The committed stock ledger, one row per (product, business).
//!
//! ## Adjust Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  adjust(delta)                                                         │
//! │                                                                         │
//! │  UPDATE inventory                                                      │
//! │     SET quantity = quantity + delta                                    │
//! │   WHERE product/business match                                         │
//! │     AND quantity + delta >= active holds   (delta < 0)                 │
//! │  RETURNING *                                                           │
//! │       │                                                                 │
//! │       ├── row returned  → applied atomically                           │
//! │       └── no row        → missing record (NotFound)                    │
//! │                           or would dip under the holds                 │
//! │                           (InsufficientStock)                          │
//! │                                                                         │
//! │  Over-deduction is rejected, never clamped to zero.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Committed stock never drops below the sum of active reservations. A
//! sale deducting its own stock releases its hold first so only other
//! sales' holds count against it.
//!
//! A product with no inventory row is not stock-tracked: the sale engine
//! neither reserves nor deducts it.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use till_core::{CoreError, Inventory, ValidationError};

/// Repository for committed stock.
pub struct InventoryRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> InventoryRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        InventoryRepository { conn }
    }

    /// Gets the inventory record, `None` when the product is untracked.
    pub async fn get(&mut self, business_id: &str, product_id: &str) -> DbResult<Option<Inventory>> {
        let inventory = sqlx::query_as::<_, Inventory>(
            "SELECT * FROM inventory WHERE product_id = ?1 AND business_id = ?2",
        )
        .bind(product_id)
        .bind(business_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(inventory)
    }

    /// Sets committed stock and threshold, creating the record if needed.
    ///
    /// Used by receiving/setup flows; sales go through [`adjust`](Self::adjust).
    /// An existing record cannot be set below what active reservations hold
    /// (`OutOfRange` naming the floor).
    pub async fn upsert(
        &mut self,
        business_id: &str,
        product_id: &str,
        quantity: i64,
        low_stock_threshold: i64,
        now: DateTime<Utc>,
    ) -> DbResult<Inventory> {
        if quantity < 0 {
            return Err(CoreError::from(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 0,
                max: i64::MAX,
            })
            .into());
        }

        debug!(product_id = %product_id, quantity, "Upserting inventory");

        let inventory = sqlx::query_as::<_, Inventory>(
            r#"
            INSERT INTO inventory (product_id, business_id, quantity, low_stock_threshold, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (product_id, business_id) DO UPDATE SET
                quantity = excluded.quantity,
                low_stock_threshold = excluded.low_stock_threshold,
                updated_at = excluded.updated_at
            WHERE excluded.quantity >= (
                SELECT COALESCE(SUM(r.quantity), 0) FROM stock_reservations r
                WHERE r.product_id = ?1 AND r.business_id = ?2 AND r.expire_at > ?5
            )
            RETURNING *
            "#,
        )
        .bind(product_id)
        .bind(business_id)
        .bind(quantity)
        .bind(low_stock_threshold)
        .bind(now)
        .fetch_optional(&mut *self.conn)
        .await?;

        match inventory {
            Some(inventory) => Ok(inventory),
            None => {
                let held = self.active_holds(business_id, product_id, now).await?;
                warn!(product_id = %product_id, quantity, held, "Rejected stock count below active holds");
                Err(CoreError::from(ValidationError::OutOfRange {
                    field: "quantity".to_string(),
                    min: held,
                    max: i64::MAX,
                })
                .into())
            }
        }
    }

    /// Atomically applies `delta` to committed stock.
    ///
    /// A negative `delta` may only consume stock nobody holds at `now`.
    ///
    /// ## Errors
    /// - `NotFound` if the product has no inventory record
    /// - `InsufficientStock` if the result would fall below the active
    ///   reservations (or below zero when there are none)
    pub async fn adjust(
        &mut self,
        business_id: &str,
        product_id: &str,
        delta: i64,
        now: DateTime<Utc>,
    ) -> DbResult<Inventory> {
        debug!(product_id = %product_id, delta, "Adjusting inventory");

        let updated = sqlx::query_as::<_, Inventory>(
            r#"
            UPDATE inventory SET quantity = quantity + ?1, updated_at = ?2
            WHERE product_id = ?3 AND business_id = ?4
              AND quantity + ?1 >= CASE WHEN ?1 < 0 THEN (
                  SELECT COALESCE(SUM(r.quantity), 0) FROM stock_reservations r
                  WHERE r.product_id = ?3 AND r.business_id = ?4 AND r.expire_at > ?2
              ) ELSE 0 END
            RETURNING *
            "#,
        )
        .bind(delta)
        .bind(now)
        .bind(product_id)
        .bind(business_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        if let Some(inventory) = updated {
            return Ok(inventory);
        }

        match self.get(business_id, product_id).await? {
            None => Err(CoreError::not_found("Inventory", product_id).into()),
            Some(current) => {
                let held = self.active_holds(business_id, product_id, now).await?;
                warn!(
                    product_id = %product_id,
                    quantity = current.quantity,
                    held,
                    delta,
                    "Rejected inventory adjustment below held stock"
                );
                Err(CoreError::insufficient_stock(product_id, (current.quantity - held).max(0), -delta).into())
            }
        }
    }

    /// Σ quantity of reservations on the product still active at `now`.
    async fn active_holds(&mut self, business_id: &str, product_id: &str, now: DateTime<Utc>) -> DbResult<i64> {
        let held: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(quantity), 0) FROM stock_reservations
            WHERE product_id = ?1 AND business_id = ?2 AND expire_at > ?3
            "#,
        )
        .bind(product_id)
        .bind(business_id)
        .bind(now)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(held)
    }

    /// Adds received stock and stamps `last_restocked_at`.
    pub async fn restock(
        &mut self,
        business_id: &str,
        product_id: &str,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> DbResult<Inventory> {
        if quantity <= 0 {
            return Err(CoreError::from(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            })
            .into());
        }

        debug!(product_id = %product_id, quantity, "Restocking inventory");

        sqlx::query_as::<_, Inventory>(
            r#"
            UPDATE inventory
               SET quantity = quantity + ?1, last_restocked_at = ?2, updated_at = ?2
            WHERE product_id = ?3 AND business_id = ?4
            RETURNING *
            "#,
        )
        .bind(quantity)
        .bind(now)
        .bind(product_id)
        .bind(business_id)
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or_else(|| DbError::from(CoreError::not_found("Inventory", product_id)))
    }

    /// Records at or below their low-stock threshold.
    pub async fn low_stock(&mut self, business_id: &str) -> DbResult<Vec<Inventory>> {
        let rows = sqlx::query_as::<_, Inventory>(
            r#"
            SELECT * FROM inventory
            WHERE business_id = ?1 AND quantity <= low_stock_threshold
            ORDER BY quantity, product_id
            "#,
        )
        .bind(business_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::{self, BUSINESS, CASHIER, SERVICE, TRACKED};
    use crate::repository::ReservationRepository;

    #[tokio::test]
    async fn test_untracked_product_has_no_record() {
        let db = fixtures::database().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = InventoryRepository::new(&mut conn);

        assert!(repo.get(BUSINESS, SERVICE).await.unwrap().is_none());
        assert_eq!(repo.get(BUSINESS, TRACKED).await.unwrap().unwrap().quantity, 10);
    }

    #[tokio::test]
    async fn test_adjust_rejects_going_negative() {
        let db = fixtures::database().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = InventoryRepository::new(&mut conn);
        let now = Utc::now();

        assert_eq!(repo.adjust(BUSINESS, TRACKED, -4, now).await.unwrap().quantity, 6);

        let err = repo.adjust(BUSINESS, TRACKED, -7, now).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::InsufficientStock { available: 6, requested: 7, .. })
        ));
        // unchanged, not clamped
        assert_eq!(repo.get(BUSINESS, TRACKED).await.unwrap().unwrap().quantity, 6);

        assert_eq!(repo.adjust(BUSINESS, TRACKED, -6, now).await.unwrap().quantity, 0);
    }

    #[tokio::test]
    async fn test_adjust_untracked_is_not_found() {
        let db = fixtures::database().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = InventoryRepository::new(&mut conn);

        let err = repo.adjust(BUSINESS, SERVICE, -1, Utc::now()).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_restock_and_low_stock() {
        let db = fixtures::database().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = InventoryRepository::new(&mut conn);
        let now = Utc::now();

        repo.adjust(BUSINESS, TRACKED, -8, now).await.unwrap();
        let low = repo.low_stock(BUSINESS).await.unwrap();
        assert_eq!(low.len(), 1);
        assert!(low[0].is_low());

        let restocked = repo.restock(BUSINESS, TRACKED, 20, now).await.unwrap();
        assert_eq!(restocked.quantity, 22);
        assert!(restocked.last_restocked_at.is_some());
        assert!(repo.low_stock(BUSINESS).await.unwrap().is_empty());

        assert!(repo.restock(BUSINESS, TRACKED, 0, now).await.is_err());
    }

    #[tokio::test]
    async fn test_adjust_cannot_eat_into_active_holds() {
        let db = fixtures::database().await;
        let mut conn = db.acquire().await.unwrap();
        fixtures::insert_draft(&mut conn, "s1").await;
        let now = Utc::now();

        ReservationRepository::new(&mut conn)
            .reserve(BUSINESS, "s1", TRACKED, CASHIER, 8, now)
            .await
            .unwrap();

        let mut repo = InventoryRepository::new(&mut conn);
        let err = repo.adjust(BUSINESS, TRACKED, -3, now).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::InsufficientStock { available: 2, requested: 3, .. })
        ));
        assert_eq!(repo.get(BUSINESS, TRACKED).await.unwrap().unwrap().quantity, 10);

        // the unheld two can go, and restocking is never blocked
        assert_eq!(repo.adjust(BUSINESS, TRACKED, -2, now).await.unwrap().quantity, 8);
        assert_eq!(repo.adjust(BUSINESS, TRACKED, 1, now).await.unwrap().quantity, 9);
    }

    #[tokio::test]
    async fn test_upsert_cannot_drop_below_active_holds() {
        let db = fixtures::database().await;
        let mut conn = db.acquire().await.unwrap();
        fixtures::insert_draft(&mut conn, "s1").await;
        let now = Utc::now();

        ReservationRepository::new(&mut conn)
            .reserve(BUSINESS, "s1", TRACKED, CASHIER, 8, now)
            .await
            .unwrap();

        let mut repo = InventoryRepository::new(&mut conn);
        let err = repo.upsert(BUSINESS, TRACKED, 3, 2, now).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::Validation(ValidationError::OutOfRange { min: 8, .. }))
        ));
        assert_eq!(repo.get(BUSINESS, TRACKED).await.unwrap().unwrap().quantity, 10);

        assert_eq!(repo.upsert(BUSINESS, TRACKED, 8, 2, now).await.unwrap().quantity, 8);
    }
}
