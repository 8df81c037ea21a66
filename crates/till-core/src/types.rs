//! # Domain Types
//!
//! Records the sale engine reads and writes.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌──────────────────┐      │
//! │  │      Sale       │──►│    SaleItem     │   │ StockReservation │      │
//! │  │  status, totals │   │  name/price     │   │  sale × product  │      │
//! │  │  table, shift   │   │  snapshots      │   │  qty, expire_at  │      │
//! │  └─────────────────┘   └─────────────────┘   └──────────────────┘      │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌──────────────────┐      │
//! │  │    Inventory    │   │      Shift      │   │     Product      │      │
//! │  │ committed stock │   │ running totals  │   │ catalog (lookup) │      │
//! │  └─────────────────┘   └─────────────────┘   └──────────────────┘      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every record is business-scoped: repositories always filter by
//! `business_id` as well as the record id.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Flat tax rate in basis points (825 = 8.25%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

// =============================================================================
// Caller Context
// =============================================================================

/// Identity supplied by the authentication/tenant layer on every call.
///
/// The engine trusts these values and never re-derives them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleContext {
    pub tenant_id: String,
    pub business_id: String,
    pub cashier_id: String,
    /// Open shift of the cashier, if the terminal runs shifts.
    pub shift_id: Option<String>,
}

impl SaleContext {
    pub fn new(
        tenant_id: impl Into<String>,
        business_id: impl Into<String>,
        cashier_id: impl Into<String>,
    ) -> Self {
        SaleContext {
            tenant_id: tenant_id.into(),
            business_id: business_id.into(),
            cashier_id: cashier_id.into(),
            shift_id: None,
        }
    }

    pub fn with_shift(mut self, shift_id: impl Into<String>) -> Self {
        self.shift_id = Some(shift_id.into());
        self
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// A business that owns products, stock and sales.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Business {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A product as the catalog reports it; snapshotted into sale items.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub business_id: String,
    pub sku: String,
    pub name: String,
    pub price_cents: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Inventory
// =============================================================================

/// Committed stock for one (product, business) pair.
///
/// A product without an inventory record is not stock-tracked.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Inventory {
    pub product_id: String,
    pub business_id: String,
    /// Authoritative on-hand quantity. Never negative.
    pub quantity: i64,
    pub low_stock_threshold: i64,
    #[ts(as = "Option<String>")]
    pub last_restocked_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Inventory {
    pub fn is_low(&self) -> bool {
        self.quantity <= self.low_stock_threshold
    }
}

/// A time-bounded hold against committed stock for an in-flight sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockReservation {
    pub id: String,
    pub product_id: String,
    pub business_id: String,
    pub sale_id: String,
    pub quantity: i64,
    pub cashier_id: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub expire_at: DateTime<Utc>,
}

impl StockReservation {
    /// A reservation counts against stock until its expiry instant.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expire_at > now
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// In progress, editable by its cashier.
    #[default]
    Draft,
    /// Parked; resumable later.
    Held,
    /// Paid and finalized; stock deducted.
    Completed,
    /// Cancelled; terminal.
    Voided,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Draft => "draft",
            SaleStatus::Held => "held",
            SaleStatus::Completed => "completed",
            SaleStatus::Voided => "voided",
        }
    }

    /// Draft and held sales accept item mutation, transfer and merge.
    pub fn is_open(&self) -> bool {
        matches!(self, SaleStatus::Draft | SaleStatus::Held)
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
    Mixed,
}

// =============================================================================
// Sale
// =============================================================================

/// Sale header. Line items live in [`SaleItem`].
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub tenant_id: String,
    pub business_id: String,
    pub status: SaleStatus,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
    pub table_ref: Option<String>,
    pub cashier_id: String,
    pub shift_id: Option<String>,
    /// Flat rate snapshotted when the draft was opened.
    pub tax_rate_bps: u32,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub amount_paid_cents: i64,
    pub change_cents: i64,
    pub payment_method: Option<PaymentMethod>,
    /// Assigned only on completion.
    pub daily_sequence: Option<i64>,
    pub receipt_number: Option<String>,
    pub void_reason: Option<String>,
    pub voided_by: Option<String>,
    #[ts(as = "String")]
    pub sale_date: NaiveDate,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub voided_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub synced_at: Option<DateTime<Utc>>,
}

impl Sale {
    #[inline]
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.tax_rate_bps)
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A line item; name and price are frozen at the time they were added.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub name_snapshot: String,
    pub unit_price_cents: i64,
    pub quantity: i64,
    /// unit_price × quantity
    pub line_total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

/// A sale with its line items, as read models return it.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleWithItems {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

// =============================================================================
// Shift
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    Open,
    Closed,
}

/// A cashier shift with running totals adjusted by completions and voids.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Shift {
    pub id: String,
    pub business_id: String,
    pub cashier_id: String,
    pub status: ShiftStatus,
    pub opening_cash_cents: i64,
    pub total_sales_cents: i64,
    pub transaction_count: i64,
    #[ts(as = "String")]
    pub opened_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub closed_at: Option<DateTime<Utc>>,
}
