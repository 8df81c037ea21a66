//! # Sale Activity Log Payloads
//!
//! One [`SaleActivity`] row is appended per state transition. The detail is a
//! tagged union keyed by the action, each variant carrying only the fields
//! that action needs. It is encoded to JSON at the storage boundary.
//!
//! ```text
//! {"action":"transferred","from_table":"T4","to_table":"T9"}
//! {"action":"merged","merged_sale_ids":["s-2","s-3"],"table_ref":null}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::types::{PaymentMethod, SaleStatus};

/// The action column of the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    Created,
    ItemAdded,
    ItemRemoved,
    Updated,
    Held,
    Resumed,
    Transferred,
    Merged,
    Completed,
    Voided,
    Deleted,
}

impl ActivityAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityAction::Created => "created",
            ActivityAction::ItemAdded => "item_added",
            ActivityAction::ItemRemoved => "item_removed",
            ActivityAction::Updated => "updated",
            ActivityAction::Held => "held",
            ActivityAction::Resumed => "resumed",
            ActivityAction::Transferred => "transferred",
            ActivityAction::Merged => "merged",
            ActivityAction::Completed => "completed",
            ActivityAction::Voided => "voided",
            ActivityAction::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field change recorded by an `updated` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FieldChange {
    pub field: String,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl FieldChange {
    pub fn new(field: impl Into<String>, from: Option<String>, to: Option<String>) -> Self {
        FieldChange {
            field: field.into(),
            from,
            to,
        }
    }
}

/// Structured detail for each activity action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "action", rename_all = "snake_case")]
#[ts(export)]
pub enum ActivityDetail {
    Created {
        table_ref: Option<String>,
        customer_name: Option<String>,
    },
    ItemAdded {
        product_id: String,
        product_name: String,
        quantity: i64,
        /// Quantity of the product on the sale after the add.
        line_quantity: i64,
        unit_price_cents: i64,
    },
    ItemRemoved {
        item_id: String,
        product_id: String,
        quantity: i64,
        reservation_released: bool,
    },
    Updated {
        changes: Vec<FieldChange>,
    },
    Held {
        note: Option<String>,
    },
    Resumed {
        reserved_products: usize,
    },
    Transferred {
        from_table: Option<String>,
        to_table: Option<String>,
    },
    Merged {
        merged_sale_ids: Vec<String>,
        table_ref: Option<String>,
        subtotal_before_cents: i64,
        subtotal_after_cents: i64,
    },
    Completed {
        daily_sequence: i64,
        receipt_number: String,
        total_cents: i64,
        amount_paid_cents: i64,
        change_cents: i64,
        discount_cents: i64,
        payment_method: PaymentMethod,
    },
    Voided {
        reason: String,
        previous_status: SaleStatus,
        restocked: bool,
    },
    Deleted {
        previous_status: SaleStatus,
        item_count: usize,
    },
}

impl ActivityDetail {
    /// The action this detail belongs to.
    pub fn action(&self) -> ActivityAction {
        match self {
            ActivityDetail::Created { .. } => ActivityAction::Created,
            ActivityDetail::ItemAdded { .. } => ActivityAction::ItemAdded,
            ActivityDetail::ItemRemoved { .. } => ActivityAction::ItemRemoved,
            ActivityDetail::Updated { .. } => ActivityAction::Updated,
            ActivityDetail::Held { .. } => ActivityAction::Held,
            ActivityDetail::Resumed { .. } => ActivityAction::Resumed,
            ActivityDetail::Transferred { .. } => ActivityAction::Transferred,
            ActivityDetail::Merged { .. } => ActivityAction::Merged,
            ActivityDetail::Completed { .. } => ActivityAction::Completed,
            ActivityDetail::Voided { .. } => ActivityAction::Voided,
            ActivityDetail::Deleted { .. } => ActivityAction::Deleted,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }
}

/// An activity log row with its decoded detail.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleActivity {
    pub id: String,
    pub sale_id: String,
    pub business_id: String,
    pub action: ActivityAction,
    pub actor_id: String,
    pub detail: ActivityDetail,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_is_tagged_by_action() {
        let detail = ActivityDetail::Transferred {
            from_table: Some("T4".to_string()),
            to_table: Some("T9".to_string()),
        };
        let json = detail.to_json().unwrap();
        assert_eq!(json, r#"{"action":"transferred","from_table":"T4","to_table":"T9"}"#);
        assert_eq!(detail.action(), ActivityAction::Transferred);
    }

    #[test]
    fn test_detail_decodes_from_log_payload() {
        let raw = r#"{"action":"merged","merged_sale_ids":["s-2","s-3"],"table_ref":null,"subtotal_before_cents":100,"subtotal_after_cents":300}"#;
        let detail = ActivityDetail::from_json(raw).unwrap();
        match detail {
            ActivityDetail::Merged { merged_sale_ids, .. } => {
                assert_eq!(merged_sale_ids, vec!["s-2".to_string(), "s-3".to_string()]);
            }
            other => panic!("unexpected detail: {other:?}"),
        }
    }

    #[test]
    fn test_action_names_match_tags() {
        let detail = ActivityDetail::ItemAdded {
            product_id: "p".to_string(),
            product_name: "P".to_string(),
            quantity: 2,
            line_quantity: 5,
            unit_price_cents: 1500,
        };
        let value: serde_json::Value = serde_json::from_str(&detail.to_json().unwrap()).unwrap();
        assert_eq!(value["action"], detail.action().as_str());
    }
}
