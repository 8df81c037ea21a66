//! # till-core: Pure Business Logic for the Till Sale Engine
//!
//! Domain types and rules shared by the database layer and the sale
//! orchestrator. Nothing in here performs I/O or reads a clock; callers pass
//! `now` in.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Till Engine Architecture                         │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 till-engine (SaleEngine)                        │   │
//! │  │   create_draft, add_item, complete_sale, void_sale, merge ...  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ till-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   sale    │  │ activity  │  │ validation│  │   │
//! │  │   │   Sale    │  │  status   │  │  detail   │  │   rules   │  │   │
//! │  │   │ Inventory │  │  totals   │  │  union    │  │           │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    till-db (Database Layer)                     │   │
//! │  │        ledgers, repositories, migrations, transactions          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (Sale, SaleItem, StockReservation, ...)
//! - [`money`] - Integer-cent money
//! - [`sale`] - Status transitions and totals recalculation
//! - [`activity`] - Activity log actions and detail payloads
//! - [`event`] - Completed/voided outcomes for subscribers
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types

pub mod activity;
pub mod error;
pub mod event;
pub mod money;
pub mod sale;
pub mod types;
pub mod validation;

pub use activity::{ActivityAction, ActivityDetail, FieldChange, SaleActivity};
pub use error::{CoreError, CoreResult, ValidationError};
pub use event::SaleEvent;
pub use money::Money;
pub use sale::{SaleOperation, SaleTotals};
pub use types::*;

/// Maximum quantity of a single product on one sale.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Reservations live this long after creation or their last refresh.
pub const DEFAULT_RESERVATION_TTL_SECS: i64 = 4 * 60 * 60;

/// Minimum length of a void reason.
pub const DEFAULT_MIN_VOID_REASON_LEN: usize = 5;
