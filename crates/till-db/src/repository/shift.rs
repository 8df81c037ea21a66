//! # Shift Repository
//!
//! Cashier shifts and their running totals. Completion adds the sale's net
//! amount and one transaction; a void of a completed sale subtracts exactly
//! the same, so the pair leaves the shift where it started.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use till_core::{CoreError, Shift, ShiftStatus, ValidationError};

/// Repository for the shift ledger.
pub struct ShiftRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ShiftRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        ShiftRepository { conn }
    }

    pub async fn open(
        &mut self,
        business_id: &str,
        cashier_id: &str,
        opening_cash_cents: i64,
        now: DateTime<Utc>,
    ) -> DbResult<Shift> {
        let shift = Shift {
            id: Uuid::new_v4().to_string(),
            business_id: business_id.to_string(),
            cashier_id: cashier_id.to_string(),
            status: ShiftStatus::Open,
            opening_cash_cents,
            total_sales_cents: 0,
            transaction_count: 0,
            opened_at: now,
            closed_at: None,
        };

        debug!(id = %shift.id, cashier_id = %cashier_id, "Opening shift");

        sqlx::query(
            r#"
            INSERT INTO shifts (
                id, business_id, cashier_id, status, opening_cash_cents,
                total_sales_cents, transaction_count, opened_at, closed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&shift.id)
        .bind(&shift.business_id)
        .bind(&shift.cashier_id)
        .bind(shift.status)
        .bind(shift.opening_cash_cents)
        .bind(shift.total_sales_cents)
        .bind(shift.transaction_count)
        .bind(shift.opened_at)
        .bind(shift.closed_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(shift)
    }

    pub async fn get(&mut self, business_id: &str, id: &str) -> DbResult<Option<Shift>> {
        let shift = sqlx::query_as::<_, Shift>("SELECT * FROM shifts WHERE id = ?1 AND business_id = ?2")
            .bind(id)
            .bind(business_id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(shift)
    }

    /// Closes an open shift.
    pub async fn close(&mut self, business_id: &str, id: &str, now: DateTime<Utc>) -> DbResult<Shift> {
        let closed = sqlx::query_as::<_, Shift>(
            r#"
            UPDATE shifts SET status = 'closed', closed_at = ?1
            WHERE id = ?2 AND business_id = ?3 AND status = 'open'
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(id)
        .bind(business_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        match closed {
            Some(shift) => Ok(shift),
            None => match self.get(business_id, id).await? {
                None => Err(CoreError::not_found("Shift", id).into()),
                Some(_) => Err(CoreError::from(ValidationError::InvalidFormat {
                    field: "shift".to_string(),
                    reason: "shift is already closed".to_string(),
                })
                .into()),
            },
        }
    }

    /// Applies a completion (`+net, +1`) or a void (`−net, −1`).
    ///
    /// Closed shifts are adjusted too: a void after close must still undo
    /// the completion it reverses.
    ///
    /// A shift of another business is `NotFound`.
    pub async fn adjust_totals(
        &mut self,
        business_id: &str,
        shift_id: &str,
        delta_cents: i64,
        delta_count: i64,
    ) -> DbResult<Shift> {
        debug!(shift_id = %shift_id, delta_cents, delta_count, "Adjusting shift totals");

        sqlx::query_as::<_, Shift>(
            r#"
            UPDATE shifts
               SET total_sales_cents = total_sales_cents + ?1,
                   transaction_count = transaction_count + ?2
            WHERE id = ?3 AND business_id = ?4
            RETURNING *
            "#,
        )
        .bind(delta_cents)
        .bind(delta_count)
        .bind(shift_id)
        .bind(business_id)
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or_else(|| DbError::from(CoreError::not_found("Shift", shift_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::{self, BUSINESS, CASHIER};
    use crate::repository::BusinessRepository;
    use till_core::Business;

    #[tokio::test]
    async fn test_adjust_is_symmetric() {
        let db = fixtures::database().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = ShiftRepository::new(&mut conn);

        let shift = repo.open(BUSINESS, CASHIER, 10_000, Utc::now()).await.unwrap();
        let after_sale = repo.adjust_totals(BUSINESS, &shift.id, 7500, 1).await.unwrap();
        assert_eq!(after_sale.total_sales_cents, 7500);
        assert_eq!(after_sale.transaction_count, 1);

        let after_void = repo.adjust_totals(BUSINESS, &shift.id, -7500, -1).await.unwrap();
        assert_eq!(after_void.total_sales_cents, shift.total_sales_cents);
        assert_eq!(after_void.transaction_count, shift.transaction_count);
    }

    #[tokio::test]
    async fn test_close_once() {
        let db = fixtures::database().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = ShiftRepository::new(&mut conn);
        let now = Utc::now();

        let shift = repo.open(BUSINESS, CASHIER, 0, now).await.unwrap();
        let closed = repo.close(BUSINESS, &shift.id, now).await.unwrap();
        assert_eq!(closed.status, ShiftStatus::Closed);

        assert!(matches!(
            repo.close(BUSINESS, &shift.id, now).await,
            Err(DbError::Core(CoreError::Validation(_)))
        ));
        assert!(matches!(
            repo.close(BUSINESS, "missing", now).await,
            Err(DbError::Core(CoreError::NotFound { .. }))
        ));
        assert!(repo.adjust_totals(BUSINESS, "missing", 1, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_adjust_ignores_other_business_shift() {
        let db = fixtures::database().await;
        let mut conn = db.acquire().await.unwrap();
        let now = Utc::now();

        BusinessRepository::new(&mut conn)
            .insert(&Business {
                id: "biz-2".to_string(),
                tenant_id: "tenant-1".to_string(),
                name: "Night Kiosk".to_string(),
                created_at: now,
            })
            .await
            .unwrap();

        let mut repo = ShiftRepository::new(&mut conn);
        let foreign = repo.open("biz-2", CASHIER, 0, now).await.unwrap();

        assert!(matches!(
            repo.adjust_totals(BUSINESS, &foreign.id, 1500, 1).await,
            Err(DbError::Core(CoreError::NotFound { .. }))
        ));
        let untouched = repo.get("biz-2", &foreign.id).await.unwrap().unwrap();
        assert_eq!(untouched.total_sales_cents, 0);
        assert_eq!(untouched.transaction_count, 0);
    }
}
