//! broker-server
//!
//! Multi-client async TCP server for the brokerage back-office.

pub mod config;
pub mod types;
pub mod dispatch;
pub mod server;

// internal, not re-exported
mod client;
