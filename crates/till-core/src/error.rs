//! # Domain Errors
//!
//! ```text
//!   ValidationError ──► CoreError ──┐
//!                                   ├──► EngineError (till-engine)
//!   DbError (till-db) ──────────────┘
//! ```
//!
//! [`ValidationError`] is raised before anything is read or written.
//! [`CoreError`] covers the rules that need stored state: status gates,
//! stock availability and payment.

use thiserror::Error;

use crate::types::SaleStatus;

// =============================================================================
// CoreError
// =============================================================================

#[derive(Debug, Error)]
pub enum CoreError {
    /// The record is absent or belongs to another business. The two cases
    /// are indistinguishable to the caller.
    #[error("{entity} {id} does not exist")]
    NotFound { entity: String, id: String },

    /// The sale's status does not allow the operation, e.g. resuming a
    /// draft or voiding twice.
    #[error("Cannot {operation} a sale in {status} status")]
    InvalidState {
        operation: String,
        status: SaleStatus,
    },

    /// `requested` exceeds what is left once other sales' active holds are
    /// subtracted from committed stock.
    #[error("Only {available} of product {product_id} available, {requested} requested")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    #[error("Payment of {paid_cents} does not cover {due_cents}")]
    InsufficientPayment { due_cents: i64, paid_cents: i64 },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Stored rows contradict each other, e.g. holds above committed stock.
    #[error("Ledger inconsistency: {0}")]
    ConsistencyViolation(String),
}

impl CoreError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// `operation` reads as a verb phrase: "add items to", "hold".
    pub fn invalid_state(operation: impl Into<String>, status: SaleStatus) -> Self {
        CoreError::InvalidState {
            operation: operation.into(),
            status,
        }
    }

    pub fn insufficient_stock(product_id: impl Into<String>, available: i64, requested: i64) -> Self {
        CoreError::InsufficientStock {
            product_id: product_id.into(),
            available,
            requested,
        }
    }
}

// =============================================================================
// ValidationError
// =============================================================================

/// Malformed input. Always detected before the transaction opens.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} needs at least {min} characters")]
    TooShort { field: String, min: usize },

    #[error("{field} allows at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must lie in {min}..={max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be greater than zero")]
    MustBePositive { field: String },

    /// Well-formed but unusable, e.g. transferring to the current table.
    #[error("{field}: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// The same id appears twice in one request.
    #[error("{field} lists '{value}' more than once")]
    Duplicate { field: String, value: String },
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_and_state_messages() {
        assert_eq!(
            CoreError::insufficient_stock("prod-y", 10, 11).to_string(),
            "Only 10 of product prod-y available, 11 requested"
        );
        assert_eq!(
            CoreError::invalid_state("add items to", SaleStatus::Completed).to_string(),
            "Cannot add items to a sale in completed status"
        );
    }

    #[test]
    fn test_validation_is_transparent_inside_core_error() {
        let err: CoreError = ValidationError::TooShort {
            field: "reason".to_string(),
            min: 5,
        }
        .into();

        assert!(matches!(err, CoreError::Validation(ValidationError::TooShort { min: 5, .. })));
        assert_eq!(err.to_string(), "reason needs at least 5 characters");
    }
}
