//! # Engine Error Type
//!
//! Unified error returned by every [`SaleEngine`](crate::SaleEngine) operation.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Till Engine                        │
//! │                                                                         │
//! │  SaleEngine::complete_sale                                             │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  Validation? ──── ValidationError ─────────────┐                       │
//! │         │                                      │                       │
//! │         ▼                                      ▼                       │
//! │  Ledger rule? ─── DbError::Core(CoreError) ── EngineError::Core ──┐   │
//! │         │                                                          │   │
//! │         ▼                                                          │   │
//! │  Store failure? ─ DbError::QueryFailed ────── EngineError::Db ─────┤   │
//! │                                                                    ▼   │
//! │                     (transaction dropped → rolled back)   code() + │   │
//! │                                                           status_code()│
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Status Mapping
//! | ErrorCode             | Status |
//! |-----------------------|--------|
//! | `NOT_FOUND`           | 404    |
//! | `INVALID_STATE`       | 422    |
//! | `INSUFFICIENT_STOCK`  | 422    |
//! | `INSUFFICIENT_PAYMENT`| 422    |
//! | `VALIDATION_ERROR`    | 400    |
//! | `DATABASE_ERROR`      | 500    |
//! | `INTERNAL`            | 500    |

use serde::Serialize;
use thiserror::Error;
use till_core::{CoreError, ValidationError};
use till_db::DbError;

/// Machine-readable error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Sale, item, product, shift or reservation absent (or another business's)
    NotFound,

    /// Operation not legal for the sale's status
    InvalidState,

    /// Reservation or deduction would exceed availability
    InsufficientStock,

    /// Amount paid below the net total
    InsufficientPayment,

    /// Malformed input
    ValidationError,

    /// Store unavailable or query failed
    DatabaseError,

    /// Configuration or consistency failure
    Internal,
}

impl ErrorCode {
    /// HTTP-equivalent status for callers that expose the engine over a wire.
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorCode::NotFound => 404,
            ErrorCode::InvalidState | ErrorCode::InsufficientStock | ErrorCode::InsufficientPayment => 422,
            ErrorCode::ValidationError => 400,
            ErrorCode::DatabaseError | ErrorCode::Internal => 500,
        }
    }
}

/// Error returned from engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A business rule rejected the operation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The store failed.
    #[error(transparent)]
    Db(DbError),

    /// Configuration could not be loaded or is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl EngineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            EngineError::Core(err) => core_code(err),
            EngineError::Db(err) => db_code(err),
            EngineError::Config(_) => ErrorCode::Internal,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.code().status_code()
    }
}

fn core_code(err: &CoreError) -> ErrorCode {
    match err {
        CoreError::NotFound { .. } => ErrorCode::NotFound,
        CoreError::InvalidState { .. } => ErrorCode::InvalidState,
        CoreError::InsufficientStock { .. } => ErrorCode::InsufficientStock,
        CoreError::InsufficientPayment { .. } => ErrorCode::InsufficientPayment,
        CoreError::Validation(_) => ErrorCode::ValidationError,
        CoreError::ConsistencyViolation(_) => ErrorCode::Internal,
    }
}

fn db_code(err: &DbError) -> ErrorCode {
    match err {
        DbError::Core(core) => core_code(core),
        DbError::NotFound { .. } => ErrorCode::NotFound,
        DbError::UniqueViolation { .. }
        | DbError::ForeignKeyViolation { .. }
        | DbError::CheckViolation { .. } => ErrorCode::ValidationError,
        _ => ErrorCode::DatabaseError,
    }
}

/// Ledger rule failures surface as core errors, not database errors.
impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Core(core) => EngineError::Core(core),
            other => EngineError::Db(other),
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(err: ValidationError) -> Self {
        EngineError::Core(CoreError::Validation(err))
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for EngineError {
    fn from(err: toml::de::Error) -> Self {
        EngineError::Config(err.to_string())
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;
    use till_core::SaleStatus;

    #[test]
    fn test_status_codes() {
        let not_found: EngineError = CoreError::not_found("Sale", "s1").into();
        assert_eq!(not_found.status_code(), 404);

        let invalid: EngineError = CoreError::invalid_state("merge", SaleStatus::Completed).into();
        assert_eq!(invalid.code(), ErrorCode::InvalidState);
        assert_eq!(invalid.status_code(), 422);

        let validation: EngineError = ValidationError::Required { field: "reason".to_string() }.into();
        assert_eq!(validation.status_code(), 400);

        let db: EngineError = DbError::PoolExhausted.into();
        assert_eq!(db.code(), ErrorCode::DatabaseError);
        assert_eq!(db.status_code(), 500);
    }

    #[test]
    fn test_ledger_errors_are_unwrapped() {
        let err: EngineError = DbError::Core(CoreError::insufficient_stock("p1", 0, 1)).into();
        assert!(matches!(err, EngineError::Core(CoreError::InsufficientStock { .. })));
        assert_eq!(err.status_code(), 422);

        let corrupt: EngineError = DbError::Core(CoreError::ConsistencyViolation("p1".into())).into();
        assert_eq!(corrupt.code(), ErrorCode::Internal);
        assert_eq!(corrupt.status_code(), 500);
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::InsufficientPayment).unwrap();
        assert_eq!(json, "\"INSUFFICIENT_PAYMENT\"");
    }
}
