//! Custody ledger for olives and the olive oil pressed from them.
//!
//! Two state machines share one role registry. Olive lots move through
//! `Planted → Harvested → Audited → Processed`; olive oil batches move through
//! `Created → Blended → Produced → Certified → Packed → ForSale → Sold` and
//! consume processed lots when blended. Every transition is admitted by an
//! [`guard::AccessGuard`] and applied through [`service::SupplyChainService`].

pub mod action;
pub mod config;
pub mod derived;
pub mod error;
pub mod events;
pub mod funds;
pub mod guard;
pub mod raw;
pub mod roles;
pub mod service;
pub mod store;
pub mod types;
pub mod utils;

pub use action::{Action, Transition};
pub use config::ChainConfig;
pub use error::{LedgerError, Result};
pub use roles::{Role, RoleBook, RoleRegistry};
pub use service::{Receipt, SupplyChainService};
pub use types::{AccountId, Amount, ProductCode};
