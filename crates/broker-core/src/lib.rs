//! broker-core
//!
//! Pure brokerage back-office logic:
//! - balance records and the asset ledger (deposit, withdraw, reserve,
//!   release, settle)
//! - order records and the order lifecycle engine
//! - version-stamped stores, per-asset-key locks, atomic units of work
//! - the customer directory boundary

pub mod side;
pub mod ids;
pub mod error;
pub mod config;
pub mod asset;
pub mod order;
pub mod asset_store;
pub mod order_store;
pub mod storage;
pub mod lock_registry;
pub mod unit_of_work;
pub mod ledger;
pub mod customer;
pub mod payout;
pub mod order_engine;
pub mod brokerage;

pub use side::Side;
pub use ids::{CustomerId, OrderId};
pub use error::{BrokerError, BrokerResult, ErrorKind};
pub use config::BrokerConfig;

pub use asset::{Asset, AssetKey};
pub use order::{Order, OrderFilter, OrderStatus};
pub use storage::Storage;
pub use lock_registry::LockRegistry;
pub use unit_of_work::UnitOfWork;
pub use ledger::AssetLedger;
pub use customer::{Customer, CustomerDirectory, InMemoryDirectory, Role};
pub use payout::{LoggingPayoutGateway, PayoutGateway};
pub use order_engine::{OrderEngine, OrderLegs};
pub use brokerage::Brokerage;
