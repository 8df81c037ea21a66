//! # Store Errors
//!
//! ```text
//!   sqlx::Error ──► DbError ──► EngineError (code + status)
//!                     ▲
//!   ledger rule ──────┘ DbError::Core(CoreError)
//! ```
//!
//! Ledgers check business rules (stock, sale existence) inside the caller's
//! transaction and raise them as [`DbError::Core`], so the orchestrator
//! reports `INSUFFICIENT_STOCK` rather than a generic store failure.
//! Constraint failures from SQLite are classified by kind; anything else
//! becomes `QueryFailed` or `Internal`.

use sqlx::error::ErrorKind;
use thiserror::Error;
use till_core::CoreError;

#[derive(Debug, Error)]
pub enum DbError {
    /// Business rule raised by a ledger.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("no {entity} with id {id}")]
    NotFound { entity: String, id: String },

    /// A UNIQUE index rejected the row. `target` is the `table.column` list.
    #[error("{target} already taken")]
    UniqueViolation { target: String },

    /// A referenced row (business, product, sale) does not exist.
    #[error("dangling reference: {detail}")]
    ForeignKeyViolation { detail: String },

    /// A CHECK or NOT NULL rule rejected the row, e.g. a zero quantity.
    #[error("row rejected by schema rule: {detail}")]
    CheckViolation { detail: String },

    #[error("cannot open store: {0}")]
    ConnectionFailed(String),

    #[error("schema migration error: {0}")]
    MigrationFailed(String),

    #[error("statement error: {0}")]
    QueryFailed(String),

    /// `BEGIN` or `COMMIT` failed; nothing from the operation was kept.
    #[error("transaction aborted: {0}")]
    TransactionFailed(String),

    /// No pooled connection freed up within the acquire timeout.
    #[error("all store connections busy")]
    PoolExhausted,

    /// A JSON column held something the current types cannot read.
    #[error("unreadable {entity} column: {reason}")]
    Decode { entity: String, reason: String },

    #[error("store error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// For `begin()` / `commit()` results. Pool exhaustion keeps its own
    /// variant so callers can tell contention from a broken store.
    pub fn transaction(err: sqlx::Error) -> Self {
        match DbError::from(err) {
            DbError::PoolExhausted => DbError::PoolExhausted,
            other => DbError::TransactionFailed(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("row", "?"),
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool closed".into()),
            sqlx::Error::Database(db_err) => {
                let detail = db_err.message().to_string();
                match db_err.kind() {
                    ErrorKind::UniqueViolation => DbError::UniqueViolation {
                        target: detail
                            .rsplit(": ")
                            .next()
                            .unwrap_or_default()
                            .to_string(),
                    },
                    ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation { detail },
                    ErrorKind::CheckViolation | ErrorKind::NotNullViolation => {
                        DbError::CheckViolation { detail }
                    }
                    _ => DbError::QueryFailed(detail),
                }
            }
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_rules_stay_core_errors() {
        let err: DbError = CoreError::insufficient_stock("p1", 2, 3).into();
        assert!(matches!(err, DbError::Core(CoreError::InsufficientStock { .. })));
        assert_eq!(err.to_string(), CoreError::insufficient_stock("p1", 2, 3).to_string());
    }

    #[test]
    fn test_pool_timeout_survives_transaction_mapping() {
        assert!(matches!(
            DbError::transaction(sqlx::Error::PoolTimedOut),
            DbError::PoolExhausted
        ));
        assert!(matches!(
            DbError::transaction(sqlx::Error::PoolClosed),
            DbError::TransactionFailed(_)
        ));
    }

    #[test]
    fn test_missing_row_is_not_found() {
        let err: DbError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
