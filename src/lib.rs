//! Upfront agreement (UFA) and invoice ledger over a flat key-value store.
//!
//! Agreements cap what may be invoiced against them at
//! `netCharge + netCharge * chargeTolerance / 100`. Invoices are raised in
//! batches, one per billing period, and every batch moves the agreement's
//! running total. The store only offers single-key reads and writes plus a
//! conditional commit; indexes, audit history and all-or-nothing updates are
//! built here on top of it.

pub mod agreement;
pub mod config;
pub mod error;
pub mod history;
pub mod index;
pub mod invoice;
pub mod merge;
pub mod operation;
pub mod service;
pub mod store;
pub mod transaction;
pub mod utils;
pub mod validation;

pub use config::LedgerConfig;
pub use error::{LedgerError, StoreError};
pub use operation::Operation;
pub use service::LedgerService;
pub use store::{KeyValueStore, MemoryStore, SledStore};
