//! walletd Stores
//!
//! Durable state for the wallet service: the account map, the append-only
//! transaction ledger, and the product catalog. The account and ledger
//! stores share one [`Database`] handle whose `commit` is the single
//! transactional boundary for every balance-affecting operation.

pub mod accounts;
pub mod catalog;
pub mod database;
pub mod ledger;

pub use accounts::{Account, AccountStore};
pub use catalog::{Product, ProductStore};
pub use database::{AccountWrite, AtomicUnit, CommittedUnit, Database, PendingRecord};
pub use ledger::LedgerStore;
