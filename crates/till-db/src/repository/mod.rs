//! # Repository Module
//!
//! Connection-scoped repositories for the till schema.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    One Transaction, Many Ledgers                        │
//! │                                                                         │
//! │  SaleEngine::complete_sale                                             │
//! │       │                                                                 │
//! │       │  let mut tx = db.begin().await?;                               │
//! │       ▼                                                                 │
//! │  SaleRepository::new(&mut tx)         lock sale, write status/totals   │
//! │  InventoryRepository::new(&mut tx)    adjust committed stock           │
//! │  ReservationRepository::new(&mut tx)  release holds                    │
//! │  SequenceRepository::new(&mut tx)     next daily number                │
//! │  ShiftRepository::new(&mut tx)        adjust running totals            │
//! │  ActivityRepository::new(&mut tx)     append one log row               │
//! │       │                                                                 │
//! │       │  tx.commit().await?;   (or drop → rollback)                    │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Each repository borrows the connection mutably for as long as it      │
//! │  lives, so they are built, used and dropped one after another.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`BusinessRepository`] - Business records
//! - [`ProductRepository`] - Catalog lookups for item snapshots
//! - [`InventoryRepository`] - Committed stock ledger
//! - [`ReservationRepository`] - Time-bounded stock holds
//! - [`SaleRepository`] - Sale headers and line items
//! - [`ActivityRepository`] - Append-only activity log
//! - [`ShiftRepository`] - Shift running totals
//! - [`SequenceRepository`] - Per-day receipt counters

pub mod activity;
pub mod business;
pub mod inventory;
pub mod product;
pub mod reservation;
pub mod sale;
pub mod sequence;
pub mod shift;

pub use activity::ActivityRepository;
pub use business::BusinessRepository;
pub use inventory::InventoryRepository;
pub use product::ProductRepository;
pub use reservation::ReservationRepository;
pub use sale::{SaleCompletion, SaleRepository};
pub use sequence::SequenceRepository;
pub use shift::ShiftRepository;
