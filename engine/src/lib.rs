//! walletd Transfer Engine
//!
//! Orchestrates every balance-affecting operation (fund, pay, purchase) as
//! one atomic unit spanning the account store and the ledger, with bounded
//! automatic retry on optimistic-concurrency conflicts.

pub mod catalog;
pub mod engine;

pub use catalog::Catalog;
pub use engine::{EngineConfig, TransferEngine, TransferOutcome};
