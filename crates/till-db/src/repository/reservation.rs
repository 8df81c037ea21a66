//! # Reservation Repository
//!
//! Time-bounded holds against committed stock for in-flight sales.
//!
//! ## Availability
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   available(product) = committed − Σ quantity of ACTIVE reservations   │
//! │                                                                         │
//! │   ACTIVE  ⇔  expire_at > now                                           │
//! │                                                                         │
//! │   committed 10                                                         │
//! │   ├── sale A holds 4  (expires 16:00)   active                         │
//! │   ├── sale B holds 3  (expires 11:00)   expired at 12:00, ignored      │
//! │   └── available at 12:00 = 10 − 4 = 6                                  │
//! │                                                                         │
//! │   At most one row per (sale, product): updates overwrite quantity,     │
//! │   an expired leftover row is overwritten in place.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Expiry only ever deletes rows, so the sweep can run alongside sale
//! operations under normal transaction isolation. A negative raw
//! availability means stock was over-reserved: reads log it and report
//! zero, and growing a hold on that product fails with
//! `ConsistencyViolation`.

use chrono::{DateTime, Duration, Utc};
use sqlx::SqliteConnection;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use till_core::{CoreError, StockReservation, ValidationError, DEFAULT_RESERVATION_TTL_SECS};

/// Repository for the stock reservation ledger.
pub struct ReservationRepository<'c> {
    conn: &'c mut SqliteConnection,
    ttl: Duration,
}

impl<'c> ReservationRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        ReservationRepository {
            conn,
            ttl: Duration::seconds(DEFAULT_RESERVATION_TTL_SECS),
        }
    }

    /// Overrides how long created or refreshed reservations live.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Committed stock minus active reservations, without flooring.
    ///
    /// `None` when the product is not stock-tracked.
    pub async fn raw_available(
        &mut self,
        business_id: &str,
        product_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<i64>> {
        let available: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT i.quantity - COALESCE((
                SELECT SUM(r.quantity) FROM stock_reservations r
                WHERE r.product_id = i.product_id
                  AND r.business_id = i.business_id
                  AND r.expire_at > ?3
            ), 0)
            FROM inventory i
            WHERE i.product_id = ?1 AND i.business_id = ?2
            "#,
        )
        .bind(product_id)
        .bind(business_id)
        .bind(now)
        .fetch_optional(&mut *self.conn)
        .await?;

        if let Some(value) = available {
            if value < 0 {
                error!(
                    business_id = %business_id,
                    product_id = %product_id,
                    available = value,
                    "Active reservations exceed committed stock"
                );
            }
        }

        Ok(available)
    }

    /// Reporting view of availability, floored at zero.
    pub async fn available_stock(
        &mut self,
        business_id: &str,
        product_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<i64>> {
        Ok(self
            .raw_available(business_id, product_id, now)
            .await?
            .map(|value| value.max(0)))
    }

    /// The active reservation for a (sale, product) pair.
    pub async fn active_for(
        &mut self,
        sale_id: &str,
        product_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<StockReservation>> {
        let reservation = sqlx::query_as::<_, StockReservation>(
            r#"
            SELECT * FROM stock_reservations
            WHERE sale_id = ?1 AND product_id = ?2 AND expire_at > ?3
            "#,
        )
        .bind(sale_id)
        .bind(product_id)
        .bind(now)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(reservation)
    }

    /// Quantity actively held by a sale for a product, zero if none.
    pub async fn active_quantity(
        &mut self,
        sale_id: &str,
        product_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<i64> {
        Ok(self
            .active_for(sale_id, product_id, now)
            .await?
            .map_or(0, |r| r.quantity))
    }

    /// All rows of a sale, expired ones included.
    pub async fn list_for_sale(&mut self, sale_id: &str) -> DbResult<Vec<StockReservation>> {
        let rows = sqlx::query_as::<_, StockReservation>(
            "SELECT * FROM stock_reservations WHERE sale_id = ?1 ORDER BY product_id",
        )
        .bind(sale_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Holds `quantity` more units of a product for a sale.
    ///
    /// If the sale already holds the product the hold grows by `quantity`.
    ///
    /// ## Errors
    /// - `InsufficientStock` if `quantity` exceeds availability
    /// - `NotFound` if the product is not stock-tracked
    pub async fn reserve(
        &mut self,
        business_id: &str,
        sale_id: &str,
        product_id: &str,
        cashier_id: &str,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> DbResult<StockReservation> {
        require_positive(quantity)?;

        let held = self.active_quantity(sale_id, product_id, now).await?;
        self.update_quantity(business_id, sale_id, product_id, cashier_id, held + quantity, now)
            .await
    }

    /// Sets a sale's hold on a product to exactly `quantity` and resets its
    /// expiry to `now + ttl`.
    ///
    /// Availability is computed as if the current hold were released first:
    /// `available + held ≥ quantity`.
    pub async fn update_quantity(
        &mut self,
        business_id: &str,
        sale_id: &str,
        product_id: &str,
        cashier_id: &str,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> DbResult<StockReservation> {
        require_positive(quantity)?;

        let held = self.active_quantity(sale_id, product_id, now).await?;
        let available = self
            .raw_available(business_id, product_id, now)
            .await?
            .ok_or_else(|| DbError::from(CoreError::not_found("Inventory", product_id)))?;

        if available < 0 && quantity > held {
            return Err(CoreError::ConsistencyViolation(format!(
                "product {product_id} is over-reserved by {}",
                -available
            ))
            .into());
        }
        if available + held < quantity {
            return Err(CoreError::insufficient_stock(product_id, (available + held).max(0), quantity).into());
        }

        debug!(
            sale_id = %sale_id,
            product_id = %product_id,
            from = held,
            to = quantity,
            "Writing stock reservation"
        );

        let reservation = sqlx::query_as::<_, StockReservation>(
            r#"
            INSERT INTO stock_reservations (
                id, product_id, business_id, sale_id, quantity, cashier_id, created_at, expire_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT (sale_id, product_id) DO UPDATE SET
                quantity = excluded.quantity,
                cashier_id = excluded.cashier_id,
                expire_at = excluded.expire_at
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(product_id)
        .bind(business_id)
        .bind(sale_id)
        .bind(quantity)
        .bind(cashier_id)
        .bind(now)
        .bind(now + self.ttl)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(reservation)
    }

    /// Lowers a sale's hold on a product to at most `quantity` without
    /// touching its expiry. `quantity == 0` releases it.
    pub async fn shrink(&mut self, sale_id: &str, product_id: &str, quantity: i64) -> DbResult<u64> {
        if quantity <= 0 {
            return self.release(sale_id, product_id).await;
        }

        let result = sqlx::query(
            r#"
            UPDATE stock_reservations SET quantity = ?1
            WHERE sale_id = ?2 AND product_id = ?3 AND quantity > ?1
            "#,
        )
        .bind(quantity)
        .bind(sale_id)
        .bind(product_id)
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Deletes a sale's hold on a product. Releasing nothing is not an error.
    pub async fn release(&mut self, sale_id: &str, product_id: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM stock_reservations WHERE sale_id = ?1 AND product_id = ?2")
            .bind(sale_id)
            .bind(product_id)
            .execute(&mut *self.conn)
            .await?;

        debug!(
            sale_id = %sale_id,
            product_id = %product_id,
            released = result.rows_affected(),
            "Released stock reservation"
        );

        Ok(result.rows_affected())
    }

    /// Deletes every hold of a sale. Idempotent.
    pub async fn release_all(&mut self, sale_id: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM stock_reservations WHERE sale_id = ?1")
            .bind(sale_id)
            .execute(&mut *self.conn)
            .await?;

        debug!(sale_id = %sale_id, released = result.rows_affected(), "Released all reservations");

        Ok(result.rows_affected())
    }

    /// Moves every hold of `from_sale` onto `to_sale`.
    ///
    /// When both sales hold the same product the active quantities are
    /// summed into the target row, which keeps the later expiry. Expired
    /// rows contribute nothing. Total active quantity per product is
    /// unchanged, so no availability check is needed.
    pub async fn reassign(&mut self, from_sale: &str, to_sale: &str, now: DateTime<Utc>) -> DbResult<usize> {
        let moving = self.list_for_sale(from_sale).await?;

        for row in &moving {
            let target = sqlx::query_as::<_, StockReservation>(
                "SELECT * FROM stock_reservations WHERE sale_id = ?1 AND product_id = ?2",
            )
            .bind(to_sale)
            .bind(&row.product_id)
            .fetch_optional(&mut *self.conn)
            .await?;

            match target {
                None => {
                    sqlx::query("UPDATE stock_reservations SET sale_id = ?1 WHERE id = ?2")
                        .bind(to_sale)
                        .bind(&row.id)
                        .execute(&mut *self.conn)
                        .await?;
                }
                Some(target) => {
                    let mut quantity = 0;
                    let mut expire_at = target.expire_at;
                    if target.is_active(now) {
                        quantity += target.quantity;
                    }
                    if row.is_active(now) {
                        quantity += row.quantity;
                        expire_at = expire_at.max(row.expire_at);
                    }

                    if quantity > 0 {
                        sqlx::query("UPDATE stock_reservations SET quantity = ?1, expire_at = ?2 WHERE id = ?3")
                            .bind(quantity)
                            .bind(expire_at)
                            .bind(&target.id)
                            .execute(&mut *self.conn)
                            .await?;
                    }

                    sqlx::query("DELETE FROM stock_reservations WHERE id = ?1")
                        .bind(&row.id)
                        .execute(&mut *self.conn)
                        .await?;
                }
            }
        }

        debug!(from = %from_sale, to = %to_sale, moved = moving.len(), "Reassigned reservations");

        Ok(moving.len())
    }

    /// Pushes the expiry of every active hold of a sale to `now + ttl`.
    ///
    /// Expired rows are left alone; they were already released to other sales.
    pub async fn refresh_for_sale(&mut self, sale_id: &str, now: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE stock_reservations SET expire_at = ?1 WHERE sale_id = ?2 AND expire_at > ?3",
        )
        .bind(now + self.ttl)
        .bind(sale_id)
        .bind(now)
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Deletes every reservation whose expiry has passed.
    pub async fn sweep_expired(&mut self, now: DateTime<Utc>) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM stock_reservations WHERE expire_at <= ?1")
            .bind(now)
            .execute(&mut *self.conn)
            .await?;

        if result.rows_affected() > 0 {
            warn!(swept = result.rows_affected(), "Swept expired stock reservations");
        }

        Ok(result.rows_affected())
    }
}

fn require_positive(quantity: i64) -> DbResult<()> {
    if quantity <= 0 {
        return Err(CoreError::from(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        })
        .into());
    }
    Ok(())
}
