//! # Validation Module
//!
//! Input checks run before a transaction is opened. Anything rejected here
//! maps to a 400-equivalent and never touches the ledgers.
//!
//! ## Usage
//! ```rust
//! use till_core::validation::{validate_quantity, validate_void_reason};
//!
//! assert!(validate_quantity(3).is_ok());
//! assert!(validate_void_reason("customer changed mind", 5).is_ok());
//! assert!(validate_void_reason("oops", 5).is_err());
//! ```

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::MAX_ITEM_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Quantity must be within `1..=MAX_ITEM_QUANTITY`.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Rejects negative money inputs (amount paid, discount).
pub fn validate_non_negative_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Discount must not exceed the pre-discount total.
pub fn validate_discount(discount_cents: i64, total_cents: i64) -> ValidationResult<()> {
    validate_non_negative_cents("discount", discount_cents)?;
    if discount_cents > total_cents {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: total_cents,
        });
    }
    Ok(())
}

/// A void reason must have at least `min_len` non-blank characters.
///
/// Returns the trimmed reason.
pub fn validate_void_reason(reason: &str, min_len: usize) -> ValidationResult<String> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        });
    }
    let length = reason.chars().count();
    if length < min_len {
        return Err(ValidationError::TooShort {
            field: "reason".to_string(),
            min: min_len,
        });
    }
    if length > 500 {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: 500,
        });
    }
    Ok(reason.to_string())
}

/// Table references are short free-form labels ("T4", "Patio 2").
pub fn validate_table_ref(table: &str) -> ValidationResult<String> {
    let table = table.trim();
    if table.is_empty() {
        return Err(ValidationError::Required {
            field: "table".to_string(),
        });
    }
    if table.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "table".to_string(),
            max: 50,
        });
    }
    Ok(table.to_string())
}

/// Optional free-text fields: trimmed, empty becomes `None`, bounded length.
pub fn normalize_optional_text(
    field: &str,
    value: Option<&str>,
    max: usize,
) -> ValidationResult<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.len() > max => Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        }),
        Some(v) => Ok(Some(v.to_string())),
    }
}

/// Secondary sales of a merge: non-empty, no repeats, never the primary.
pub fn validate_merge_targets(primary_id: &str, secondary_ids: &[String]) -> ValidationResult<()> {
    if secondary_ids.is_empty() {
        return Err(ValidationError::Required {
            field: "secondary_sale_ids".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for id in secondary_ids {
        if id == primary_id {
            return Err(ValidationError::InvalidFormat {
                field: "secondary_sale_ids".to_string(),
                reason: "a sale cannot be merged into itself".to_string(),
            });
        }
        if !seen.insert(id.as_str()) {
            return Err(ValidationError::Duplicate {
                field: "secondary_sale_ids".to_string(),
                value: id.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-2).is_err());
        assert!(validate_quantity(MAX_ITEM_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_discount() {
        assert!(validate_discount(0, 7500).is_ok());
        assert!(validate_discount(7500, 7500).is_ok());
        assert!(validate_discount(7501, 7500).is_err());
        assert!(validate_discount(-1, 7500).is_err());
    }

    #[test]
    fn test_validate_void_reason() {
        assert_eq!(validate_void_reason("  wrong table  ", 5).unwrap(), "wrong table");
        assert!(matches!(
            validate_void_reason("no", 5),
            Err(ValidationError::TooShort { min: 5, .. })
        ));
        assert!(matches!(
            validate_void_reason("   ", 5),
            Err(ValidationError::Required { .. })
        ));
    }

    #[test]
    fn test_void_reason_limits_count_characters() {
        // 400 chars, 800 bytes
        let long_but_allowed = "é".repeat(400);
        assert!(validate_void_reason(&long_but_allowed, 5).is_ok());

        assert!(matches!(
            validate_void_reason(&"ü".repeat(501), 5),
            Err(ValidationError::TooLong { max: 500, .. })
        ));
        assert!(matches!(
            validate_void_reason("ñañá", 5),
            Err(ValidationError::TooShort { .. })
        ));
    }

    #[test]
    fn test_normalize_optional_text() {
        assert_eq!(normalize_optional_text("notes", Some("  "), 10).unwrap(), None);
        assert_eq!(
            normalize_optional_text("notes", Some(" extra ice "), 20).unwrap(),
            Some("extra ice".to_string())
        );
        assert!(normalize_optional_text("notes", Some("abcdef"), 3).is_err());
    }

    #[test]
    fn test_validate_merge_targets() {
        let ids = |v: &[&str]| v.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        assert!(validate_merge_targets("a", &ids(&["b", "c"])).is_ok());
        assert!(validate_merge_targets("a", &[]).is_err());
        assert!(validate_merge_targets("a", &ids(&["b", "a"])).is_err());
        assert!(matches!(
            validate_merge_targets("a", &ids(&["b", "b"])),
            Err(ValidationError::Duplicate { .. })
        ));
    }
}
