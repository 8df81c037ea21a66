//! # till-db: Database Layer for the Till Sale Engine
//!
//! SQLite persistence for sales, stock and shifts, via sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Till Engine Data Flow                            │
//! │                                                                         │
//! │  SaleEngine::add_item / complete_sale / merge_bills ...                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     till-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐ │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │ │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │ │   │
//! │  │   │               │    │ Sale           │    │              │ │   │
//! │  │   │ SqlitePool    │───►│ Inventory      │    │ 001 catalog  │ │   │
//! │  │   │ begin() → tx  │    │ Reservation    │    │ 002 sales    │ │   │
//! │  │   │               │    │ Activity/Shift │    │ 003 holds    │ │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘ │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database (WAL)                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Connection-scoped repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use till_db::{Database, DbConfig, ReservationRepository};
//!
//! let db = Database::new(DbConfig::new("till.db")).await?;
//! let mut tx = db.begin().await?;
//! let available = ReservationRepository::new(&mut tx)
//!     .available_stock(&business_id, &product_id, Utc::now())
//!     .await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::sequence::receipt_number;
pub use repository::{
    ActivityRepository, BusinessRepository, InventoryRepository, ProductRepository,
    ReservationRepository, SaleCompletion, SaleRepository, SequenceRepository, ShiftRepository,
};
