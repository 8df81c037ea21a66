//! # till-engine: Sale Orchestrator for the Till POS Engine
//!
//! Turns cashier actions into transactional changes across the sale,
//! reservation, inventory, shift and activity ledgers.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Till Engine Architecture                         │
//! │                                                                         │
//! │  Terminal / API layer  (auth + tenant context, entitlement checks)     │
//! │       │  SaleContext { tenant_id, business_id, cashier_id, shift_id }  │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               ★ till-engine (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   SaleEngine ──────────► EventPublisher ──► subscribers         │   │
//! │  │      │                   (completed / voided)                   │   │
//! │  │      │                                                          │   │
//! │  │   ReservationSweeper    EngineConfig    EngineError/ErrorCode   │   │
//! │  └──────┼──────────────────────────────────────────────────────────┘   │
//! │         ▼                                                               │
//! │  till-db (ledgers, one transaction per use case)                       │
//! │         ▼                                                               │
//! │  till-core (status machine, totals, validation)                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use till_core::SaleContext;
//! use till_engine::{Checkout, EngineConfig, NewSale, SaleEngine};
//!
//! let engine = SaleEngine::open(&EngineConfig::load(None)?).await?;
//! let ctx = SaleContext::new("tenant-1", "biz-1", "cashier-1");
//!
//! let sale = engine.create_draft(&ctx, NewSale::default()).await?;
//! engine.add_item(&ctx, &sale.id, "prod-cola", 3).await?;
//! let done = engine.complete_sale(&ctx, &sale.id, Checkout::cash(4500)).await?;
//! println!("receipt {}", done.receipt_number);
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod sweeper;

pub use config::{DatabaseSettings, EngineConfig, EventSettings, SalesSettings, SweeperSettings};
pub use engine::{Checkout, CompletedSale, NewSale, RemovalMode, SaleDetailsUpdate, SaleEngine};
pub use error::{EngineError, EngineResult, ErrorCode};
pub use events::EventPublisher;
pub use sweeper::{ReservationSweeper, SweeperHandle};
