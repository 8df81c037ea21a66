//! # Pool & Transactions
//!
//! Opens the SQLite store and hands out the one transaction each sale
//! operation runs in.
//!
//! ```text
//!  cashier A: add_item ─┐
//!  cashier B: complete ─┼─► SqlitePool ─► BEGIN ... first write takes the
//!  sweeper:   sweep     ─┘                 file lock; the others wait up to
//!                                          busy_timeout, then see the
//!                                          committed rows
//! ```
//!
//! The file runs in WAL mode: `available_stock` and `get_sale` read a
//! snapshot while a writer is mid-transaction. Writers never interleave,
//! which is what keeps reservation checks and their inserts atomic.

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;

const MEMORY: &str = ":memory:";

// =============================================================================
// DbConfig
// =============================================================================

/// Where the store lives and how the pool around it behaves.
///
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/till/till.db").busy_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    /// Upper bound on pooled connections. Forced to 1 for `:memory:`.
    pub max_connections: u32,
    /// How long a caller waits for a free pooled connection.
    pub acquire_timeout: Duration,
    /// How long a second writer queues behind the one holding the lock.
    pub busy_timeout: Duration,
    /// Apply pending migrations while opening.
    pub migrate: bool,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            path: path.into(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            busy_timeout: Duration::from_secs(5),
            migrate: true,
        }
    }

    /// A private, migrated store that vanishes with the pool. Tests use it.
    pub fn in_memory() -> Self {
        DbConfig::new(MEMORY).max_connections(1)
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, migrate: bool) -> Self {
        self.migrate = migrate;
        self
    }

    fn is_memory(&self) -> bool {
        self.path == Path::new(MEMORY)
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        let options = if self.is_memory() {
            SqliteConnectOptions::new().in_memory(true)
        } else {
            SqliteConnectOptions::new()
                .filename(&self.path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };

        options
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout)
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        let pool = SqlitePoolOptions::new().acquire_timeout(self.acquire_timeout);

        if self.is_memory() {
            // Every new connection would be a different empty database
            pool.max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            pool.max_connections(self.max_connections.max(1))
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Cheap-to-clone handle over the pool.
///
/// Nothing here knows about sales. Callers open a transaction, wrap it in
/// the repositories they need and commit once:
///
/// ```rust,ignore
/// let mut tx = db.begin().await?;
/// let sale = SaleRepository::new(&mut tx).lock(&business_id, &sale_id, now).await?;
/// ReservationRepository::new(&mut tx).release_all(&sale.id).await?;
/// tx.commit().await.map_err(DbError::transaction)?;
/// ```
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the store at `config.path` and brings the
    /// schema up to date unless `run_migrations(false)` was set.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.path.display(), "Opening sale store");

        let pool = config
            .pool_options()
            .connect_with(config.connect_options())
            .await
            .map_err(|e| DbError::ConnectionFailed(format!("{}: {e}", config.path.display())))?;

        debug!(
            max_connections = config.max_connections,
            busy_timeout_ms = config.busy_timeout.as_millis() as u64,
            "Pool ready"
        );

        let db = Database { pool };
        if config.migrate {
            db.run_migrations().await?;
        }
        Ok(db)
    }

    /// Brings the schema up to date. Safe to call repeatedly.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Starts the transaction a sale operation runs in. Dropping it without
    /// `commit` rolls everything back.
    pub async fn begin(&self) -> DbResult<Transaction<'static, Sqlite>> {
        self.pool.begin().await.map_err(DbError::transaction)
    }

    /// A bare connection for reads that need no transaction.
    pub async fn acquire(&self) -> DbResult<PoolConnection<Sqlite>> {
        Ok(self.pool.acquire().await?)
    }

    /// Waits for checked-out connections to return, then closes the pool.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Sale store closed");
    }

    /// `true` while the store still answers queries.
    pub async fn health_check(&self) -> bool {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_opens_migrated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert!(db.health_check().await);

        let (known, applied) = migrations::migration_status(db.pool()).await.unwrap();
        assert!(known > 0);
        assert_eq!(known, applied);

        db.close().await;
        assert!(!db.health_check().await);
    }

    #[test]
    fn test_memory_path_detection() {
        assert!(DbConfig::in_memory().max_connections(8).is_memory());
        assert!(!DbConfig::new("/srv/till/till.db").is_memory());
    }

    #[tokio::test]
    async fn test_skipping_migrations_leaves_empty_schema() {
        let db = Database::new(DbConfig::in_memory().run_migrations(false)).await.unwrap();

        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'sales'",
        )
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(tables, 0);
    }

    #[tokio::test]
    async fn test_dropped_transaction_rolls_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        sqlx::query(
            "INSERT INTO businesses (id, tenant_id, name, created_at) VALUES ('b1', 't1', 'Kiosk', '2026-03-01')",
        )
        .execute(&mut *tx)
        .await
        .unwrap();
        drop(tx);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM businesses")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
