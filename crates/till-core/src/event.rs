//! # Sale Events
//!
//! Outcomes published after a completion or void commits. Notification,
//! reporting and printing/KDS consumers subscribe to these; the engine never
//! waits for them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{PaymentMethod, SaleItem, SaleStatus};

/// A committed sale outcome.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(tag = "type", rename_all = "snake_case")]
#[ts(export)]
pub enum SaleEvent {
    Completed {
        sale_id: String,
        business_id: String,
        cashier_id: String,
        shift_id: Option<String>,
        table_ref: Option<String>,
        receipt_number: String,
        total_cents: i64,
        amount_paid_cents: i64,
        change_cents: i64,
        payment_method: PaymentMethod,
        items: Vec<SaleItem>,
        #[ts(as = "String")]
        completed_at: DateTime<Utc>,
    },
    Voided {
        sale_id: String,
        business_id: String,
        cashier_id: String,
        previous_status: SaleStatus,
        reason: String,
        total_cents: i64,
        restocked: bool,
        #[ts(as = "String")]
        voided_at: DateTime<Utc>,
    },
}

impl SaleEvent {
    pub fn sale_id(&self) -> &str {
        match self {
            SaleEvent::Completed { sale_id, .. } | SaleEvent::Voided { sale_id, .. } => sale_id,
        }
    }

    pub fn business_id(&self) -> &str {
        match self {
            SaleEvent::Completed { business_id, .. } | SaleEvent::Voided { business_id, .. } => business_id,
        }
    }
}
