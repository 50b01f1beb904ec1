//! walletd Server
//!
//! The HTTP surface of the wallet service: route handlers, typed request
//! and response bodies, credential extraction, and the error-to-status
//! mapping. The binary in `main.rs` wires configuration, logging, and
//! graceful shutdown around the router built here.

pub mod api;
pub mod config;

pub use api::{create_router, AppState};
pub use config::ServerConfig;
