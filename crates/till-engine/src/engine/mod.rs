//! # Sale Orchestrator
//!
//! [`SaleEngine`] runs every sale use case as exactly one database
//! transaction over the ledgers in till-db.
//!
//! ## Transaction Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    One Use Case = One Transaction                       │
//! │                                                                         │
//! │  validate input ──► BEGIN                                              │
//! │                       │                                                 │
//! │                       ▼                                                 │
//! │                 lock sale row  (UPDATE sales ... RETURNING *)          │
//! │                       │        takes the SQLite write lock; concurrent │
//! │                       │        writers queue on busy_timeout           │
//! │                       ▼                                                 │
//! │                 next_status(current, operation)                        │
//! │                       │                                                 │
//! │                       ▼                                                 │
//! │        items / reservations / inventory / shift / sequence             │
//! │                       │                                                 │
//! │                       ▼                                                 │
//! │             recalculate totals  ──►  append activity row               │
//! │                       │                                                 │
//! │                       ▼                                                 │
//! │                    COMMIT ──► publish SaleEvent (complete / void)      │
//! │                                                                         │
//! │  Any error before COMMIT drops the transaction: nothing is written.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Operations
//! | Module       | Operations                                                 |
//! |--------------|------------------------------------------------------------|
//! | [`drafts`]   | create, read, list, details, hold, resume, delete          |
//! | [`items`]    | add, set quantity, remove                                  |
//! | [`checkout`] | complete, void                                             |
//! | [`tables`]   | transfer, merge                                            |

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tokio::sync::broadcast;
use tracing::{info, instrument};

use till_core::{Money, PaymentMethod, Sale, SaleContext, SaleEvent, SaleItem, SaleTotals};
use till_db::{Database, InventoryRepository, ReservationRepository, SaleRepository};

use crate::config::{EngineConfig, SalesSettings};
use crate::error::EngineResult;
use crate::events::EventPublisher;

pub mod checkout;
pub mod drafts;
pub mod items;
pub mod tables;

// =============================================================================
// Requests & Responses
// =============================================================================

/// Input for [`SaleEngine::create_draft`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSale {
    pub table_ref: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
}

/// Customer detail edits. `None` leaves a field alone; an empty string
/// clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaleDetailsUpdate {
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
}

/// What happens to a product's reservation when one of its lines is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalMode {
    /// Shrink the hold to the quantity still on the sale (release at zero).
    ReleaseReservation,
    /// Leave the hold in place; a later void or completion clears it.
    KeepReservation,
}

/// Payment captured at completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkout {
    pub amount_paid_cents: i64,
    pub discount_cents: i64,
    pub payment_method: PaymentMethod,
}

impl Checkout {
    pub fn cash(amount_paid_cents: i64) -> Self {
        Checkout {
            amount_paid_cents,
            discount_cents: 0,
            payment_method: PaymentMethod::Cash,
        }
    }

    pub fn with_discount(mut self, discount_cents: i64) -> Self {
        self.discount_cents = discount_cents;
        self
    }
}

/// Result of [`SaleEngine::complete_sale`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedSale {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub change_cents: i64,
    pub receipt_number: String,
}

// =============================================================================
// Engine
// =============================================================================

/// The sale orchestrator.
///
/// Holds no per-sale state; all coordination goes through database
/// transactions, so one engine can be shared across request handlers.
#[derive(Debug, Clone)]
pub struct SaleEngine {
    db: Database,
    settings: SalesSettings,
    events: EventPublisher,
}

impl SaleEngine {
    pub fn new(db: Database, settings: SalesSettings, events: EventPublisher) -> Self {
        SaleEngine { db, settings, events }
    }

    /// Opens the database described by `config` and builds an engine on it.
    pub async fn open(config: &EngineConfig) -> EngineResult<Self> {
        let db = Database::new(config.db_config()).await?;
        info!(path = ?config.database.path, "Sale engine ready");
        Ok(SaleEngine::new(
            db,
            config.sales.clone(),
            EventPublisher::new(config.events.capacity),
        ))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn settings(&self) -> &SalesSettings {
        &self.settings
    }

    /// Receives completed and voided sale events.
    pub fn subscribe(&self) -> broadcast::Receiver<SaleEvent> {
        self.events.subscribe()
    }

    /// Reporting view of a product's availability (never negative).
    ///
    /// `None` when the product is not stock-tracked.
    #[instrument(skip(self, ctx), fields(business_id = %ctx.business_id))]
    pub async fn available_stock(&self, ctx: &SaleContext, product_id: &str) -> EngineResult<Option<i64>> {
        let mut conn = self.db.acquire().await?;
        let available = ReservationRepository::new(&mut conn)
            .available_stock(&ctx.business_id, product_id, Utc::now())
            .await?;
        Ok(available)
    }

    /// Deletes every expired reservation across all businesses.
    pub async fn sweep_expired_reservations(&self) -> EngineResult<u64> {
        let mut conn = self.db.acquire().await?;
        let swept = ReservationRepository::new(&mut conn)
            .sweep_expired(Utc::now())
            .await?;
        Ok(swept)
    }

    pub(crate) fn reservations<'c>(&self, conn: &'c mut SqliteConnection) -> ReservationRepository<'c> {
        ReservationRepository::new(conn).with_ttl(self.settings.reservation_ttl())
    }

    pub(crate) fn publish(&self, event: SaleEvent) {
        self.events.publish(event);
    }
}

// =============================================================================
// Shared Steps
// =============================================================================

/// Recomputes totals from the sale's current items and stores them.
///
/// Returns the totals and the items they were computed from.
pub(crate) async fn recalculate(
    conn: &mut SqliteConnection,
    sale: &Sale,
    discount: Money,
    now: DateTime<Utc>,
) -> EngineResult<(SaleTotals, Vec<SaleItem>)> {
    let mut sales = SaleRepository::new(conn);
    let items = sales.items(&sale.id).await?;
    let totals = SaleTotals::compute(&items, sale.tax_rate(), discount);
    sales.update_totals(&sale.id, &totals, now).await?;
    Ok((totals, items))
}

/// Total quantity per product across a sale's lines.
pub(crate) fn product_quantities(items: &[SaleItem]) -> BTreeMap<String, i64> {
    let mut quantities = BTreeMap::new();
    for item in items {
        *quantities.entry(item.product_id.clone()).or_insert(0) += item.quantity;
    }
    quantities
}

/// A product is stock-tracked iff it has an inventory record.
pub(crate) async fn is_tracked(conn: &mut SqliteConnection, business_id: &str, product_id: &str) -> EngineResult<bool> {
    Ok(InventoryRepository::new(conn)
        .get(business_id, product_id)
        .await?
        .is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, product: &str, qty: i64) -> SaleItem {
        SaleItem {
            id: id.to_string(),
            sale_id: "s1".to_string(),
            product_id: product.to_string(),
            name_snapshot: product.to_string(),
            unit_price_cents: 100,
            quantity: qty,
            line_total_cents: 100 * qty,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_product_quantities_sums_duplicate_lines() {
        let items = vec![item("i1", "cola", 2), item("i2", "chips", 1), item("i3", "cola", 3)];
        let quantities = product_quantities(&items);
        assert_eq!(quantities.len(), 2);
        assert_eq!(quantities["cola"], 5);
        assert_eq!(quantities["chips"], 1);
    }

    #[test]
    fn test_checkout_builder() {
        let checkout = Checkout::cash(7500).with_discount(500);
        assert_eq!(checkout.amount_paid_cents, 7500);
        assert_eq!(checkout.discount_cents, 500);
        assert_eq!(checkout.payment_method, PaymentMethod::Cash);
    }
}
