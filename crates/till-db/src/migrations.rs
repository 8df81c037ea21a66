//! Schema migrations, embedded from `migrations/sqlite/` at build time.
//!
//! | file                                   | adds                                   |
//! |----------------------------------------|----------------------------------------|
//! | `001_initial_schema.sql`               | businesses, products, inventory, shifts |
//! | `002_sales.sql`                        | sales, sale items, activity log        |
//! | `003_reservations_and_sequences.sql`   | stock holds, daily receipt counters    |
//!
//! Applied files are recorded in `_sqlx_migrations` and never edited
//! afterwards; schema changes go in a new numbered file.

use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Applies whatever the store has not seen yet, oldest first.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    debug!(known = MIGRATOR.migrations.len(), "Applying schema migrations");
    MIGRATOR.run(pool).await?;
    info!("Schema up to date");
    Ok(())
}

/// `(known, applied)` migration counts. A store that was never migrated
/// reports zero applied.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let applied: Option<i64> =
        sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await
            .ok();

    Ok((MIGRATOR.migrations.len(), applied.unwrap_or(0) as usize))
}
