//! # Activity Repository
//!
//! Append-only audit trail of sale state changes. Detail payloads are stored
//! as JSON of [`ActivityDetail`] and decoded on the way out; the table's
//! triggers reject any UPDATE or DELETE.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use till_core::{ActivityAction, ActivityDetail, SaleActivity};

#[derive(sqlx::FromRow)]
struct ActivityRow {
    id: String,
    sale_id: String,
    business_id: String,
    action: ActivityAction,
    actor_id: String,
    details: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ActivityRow> for SaleActivity {
    type Error = DbError;

    fn try_from(row: ActivityRow) -> Result<Self, Self::Error> {
        let detail = ActivityDetail::from_json(&row.details).map_err(|e| DbError::Decode {
            entity: "SaleActivity".to_string(),
            reason: e.to_string(),
        })?;

        Ok(SaleActivity {
            id: row.id,
            sale_id: row.sale_id,
            business_id: row.business_id,
            action: row.action,
            actor_id: row.actor_id,
            detail,
            created_at: row.created_at,
        })
    }
}

/// Repository for the sale activity log.
pub struct ActivityRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> ActivityRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        ActivityRepository { conn }
    }

    /// Appends one row; the action is taken from the detail variant.
    pub async fn append(
        &mut self,
        business_id: &str,
        sale_id: &str,
        actor_id: &str,
        detail: ActivityDetail,
        now: DateTime<Utc>,
    ) -> DbResult<SaleActivity> {
        let details = detail.to_json().map_err(|e| DbError::Internal(e.to_string()))?;
        let activity = SaleActivity {
            id: Uuid::new_v4().to_string(),
            sale_id: sale_id.to_string(),
            business_id: business_id.to_string(),
            action: detail.action(),
            actor_id: actor_id.to_string(),
            detail,
            created_at: now,
        };

        debug!(sale_id = %sale_id, action = %activity.action, "Appending sale activity");

        sqlx::query(
            r#"
            INSERT INTO sale_activity_logs (id, sale_id, business_id, action, actor_id, details, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&activity.id)
        .bind(&activity.sale_id)
        .bind(&activity.business_id)
        .bind(activity.action)
        .bind(&activity.actor_id)
        .bind(details)
        .bind(activity.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(activity)
    }

    /// Every row of a sale in creation order. Nothing is filtered out.
    pub async fn list(&mut self, business_id: &str, sale_id: &str) -> DbResult<Vec<SaleActivity>> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT * FROM sale_activity_logs
            WHERE sale_id = ?1 AND business_id = ?2
            ORDER BY created_at, rowid
            "#,
        )
        .bind(sale_id)
        .bind(business_id)
        .fetch_all(&mut *self.conn)
        .await?;

        rows.into_iter().map(SaleActivity::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures::{self, BUSINESS, CASHIER};

    #[tokio::test]
    async fn test_append_and_list_in_order() {
        let db = fixtures::database().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = ActivityRepository::new(&mut conn);
        let now = Utc::now();

        repo.append(
            BUSINESS,
            "s1",
            CASHIER,
            ActivityDetail::Created {
                table_ref: Some("T4".to_string()),
                customer_name: None,
            },
            now,
        )
        .await
        .unwrap();
        repo.append(BUSINESS, "s1", CASHIER, ActivityDetail::Held { note: None }, now)
            .await
            .unwrap();

        let rows = repo.list(BUSINESS, "s1").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].action, ActivityAction::Created);
        assert_eq!(rows[1].action, ActivityAction::Held);
        assert!(repo.list("other-biz", "s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_log_rows_cannot_be_changed() {
        let db = fixtures::database().await;
        let mut conn = db.acquire().await.unwrap();
        let entry = ActivityRepository::new(&mut conn)
            .append(BUSINESS, "s1", CASHIER, ActivityDetail::Held { note: None }, Utc::now())
            .await
            .unwrap();

        let update = sqlx::query("UPDATE sale_activity_logs SET actor_id = 'x' WHERE id = ?1")
            .bind(&entry.id)
            .execute(&mut *conn)
            .await;
        assert!(update.is_err());

        let delete = sqlx::query("DELETE FROM sale_activity_logs WHERE id = ?1")
            .bind(&entry.id)
            .execute(&mut *conn)
            .await;
        assert!(delete.is_err());
    }
}
