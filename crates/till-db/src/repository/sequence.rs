//! # Sequence Repository
//!
//! Per-business, per-day receipt counters. The next value is produced by a
//! single upsert, so two completions on the same day can never read the same
//! "last" value and both write it back.

use chrono::NaiveDate;
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;

/// Repository for daily sequence counters.
pub struct SequenceRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> SequenceRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        SequenceRepository { conn }
    }

    /// Atomically increments and returns the counter; the first call of a day returns 1.
    pub async fn next(&mut self, business_id: &str, day: NaiveDate) -> DbResult<i64> {
        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO daily_sequences (business_id, day, last_value) VALUES (?1, ?2, 1)
            ON CONFLICT (business_id, day) DO UPDATE SET last_value = last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(business_id)
        .bind(day)
        .fetch_one(&mut *self.conn)
        .await?;

        debug!(business_id = %business_id, day = %day, value, "Assigned daily sequence");

        Ok(value)
    }

    /// The last value handed out for a day.
    pub async fn current(&mut self, business_id: &str, day: NaiveDate) -> DbResult<Option<i64>> {
        let value: Option<i64> = sqlx::query_scalar(
            "SELECT last_value FROM daily_sequences WHERE business_id = ?1 AND day = ?2",
        )
        .bind(business_id)
        .bind(day)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(value)
    }
}

/// Receipt number for a completed sale: `YYYYMMDD-NNNN`.
pub fn receipt_number(day: NaiveDate, sequence: i64) -> String {
    format!("{}-{:04}", day.format("%Y%m%d"), sequence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::{self, BUSINESS};

    #[tokio::test]
    async fn test_sequence_increments_per_day() {
        let db = fixtures::database().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = SequenceRepository::new(&mut conn);
        let day = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let next_day = day.succ_opt().unwrap();

        assert_eq!(repo.current(BUSINESS, day).await.unwrap(), None);
        assert_eq!(repo.next(BUSINESS, day).await.unwrap(), 1);
        assert_eq!(repo.next(BUSINESS, day).await.unwrap(), 2);
        assert_eq!(repo.next(BUSINESS, next_day).await.unwrap(), 1);
        assert_eq!(repo.current(BUSINESS, day).await.unwrap(), Some(2));
    }

    #[test]
    fn test_receipt_number_format() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(receipt_number(day, 42), "20260307-0042");
        assert_eq!(receipt_number(day, 12345), "20260307-12345");
    }
}
