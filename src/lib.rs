//! # settlement-engine
//!
//! Settlement calculation and distribution engine for a creator
//! marketplace.
//!
//! Every financial occurrence (payment, refund, chargeback, fee
//! adjustment) is recorded as an immutable settlement event. At ingestion
//! the engine computes a deterministic integer split of the money across
//! the platform, creator, growth, and risk pools, materializes the split
//! as distribution-ledger rows, and conserves every minor currency unit
//! exactly. Creator shares flow through a hold window into payout
//! batches; reversals scale the original allocation and append negating
//! rows instead of editing anything.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── SettlementService (service/)
//!     ├── Calculation Core (calc/, pure)
//!     │
//!     ├── SettlementStore (persistence/)
//!     │     ├── PostgresStore (sqlx)
//!     │     └── MemoryStore (tests, local dev)
//!     │
//!     └── PostgreSQL
//! ```

pub mod api;
pub mod app_state;
pub mod calc;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
