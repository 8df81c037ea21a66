//! # Business Repository

use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use till_core::Business;

/// Repository for business records.
pub struct BusinessRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> BusinessRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        BusinessRepository { conn }
    }

    pub async fn insert(&mut self, business: &Business) -> DbResult<()> {
        debug!(id = %business.id, "Inserting business");

        sqlx::query(
            "INSERT INTO businesses (id, tenant_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&business.id)
        .bind(&business.tenant_id)
        .bind(&business.name)
        .bind(business.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    pub async fn get(&mut self, id: &str) -> DbResult<Option<Business>> {
        let business = sqlx::query_as::<_, Business>("SELECT * FROM businesses WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(business)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;

    #[tokio::test]
    async fn test_get_business() {
        let db = fixtures::database().await;
        let mut conn = db.acquire().await.unwrap();
        let mut repo = BusinessRepository::new(&mut conn);

        let business = repo.get(fixtures::BUSINESS).await.unwrap().unwrap();
        assert_eq!(business.name, "Corner Cafe");
        assert!(repo.get("missing").await.unwrap().is_none());
    }
}
