//! Top-level wiring of the core components.
//!
//! [`Brokerage`] is what the request layer talks to: it owns the
//! stores, lock registry, ledger, order engine, customer directory and
//! payout gateway, and exposes the lifecycle operations keyed by
//! username. Authorization of the actor against the target customer is
//! the caller's job, except for cancel, which the order engine checks
//! itself.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;

use crate::asset::Asset;
use crate::config::BrokerConfig;
use crate::customer::{CustomerDirectory, InMemoryDirectory, Role};
use crate::error::{BrokerError, BrokerResult};
use crate::ids::{CustomerId, OrderId};
use crate::ledger::AssetLedger;
use crate::lock_registry::LockRegistry;
use crate::order::{Order, OrderFilter};
use crate::order_engine::OrderEngine;
use crate::payout::{LoggingPayoutGateway, PayoutGateway};
use crate::side::Side;
use crate::storage::Storage;

pub struct Brokerage {
    config: BrokerConfig,
    directory: Arc<dyn CustomerDirectory>,
    ledger: AssetLedger,
    engine: OrderEngine,
    payouts: Arc<dyn PayoutGateway>,
}

impl Brokerage {
    /// In-memory directory, logging payout gateway.
    pub fn new(config: BrokerConfig) -> Self {
        Brokerage::with_parts(
            config,
            Arc::new(InMemoryDirectory::new()),
            Arc::new(LoggingPayoutGateway),
        )
    }

    pub fn with_parts(
        config: BrokerConfig,
        directory: Arc<dyn CustomerDirectory>,
        payouts: Arc<dyn PayoutGateway>,
    ) -> Self {
        let ledger = AssetLedger::new(Arc::new(Storage::new()), Arc::new(LockRegistry::new()));
        let engine = OrderEngine::new(ledger.clone(), directory.clone(), config.cash_asset.clone());
        Brokerage {
            config,
            directory,
            ledger,
            engine,
            payouts,
        }
    }

    pub fn cash_asset(&self) -> &str {
        &self.config.cash_asset
    }

    pub fn directory(&self) -> &dyn CustomerDirectory {
        self.directory.as_ref()
    }

    pub fn ledger(&self) -> &AssetLedger {
        &self.ledger
    }

    pub fn engine(&self) -> &OrderEngine {
        &self.engine
    }

    pub fn register(&self, username: &str, credential: &str, role: Role) -> BrokerResult<CustomerId> {
        self.directory.register(username, credential, role)
    }

    /// Add cash to a customer's balance.
    pub async fn deposit_cash(&self, username: &str, amount: Decimal) -> BrokerResult<Asset> {
        let customer_id = self.directory.resolve_customer_id(username)?;
        let mut uow = self.ledger.begin();
        let asset = self
            .ledger
            .deposit(&mut uow, customer_id, &self.config.cash_asset, amount)
            .await?;
        uow.commit()?;
        info!(customer_id = %customer_id, amount = %amount, "cash deposited");
        Ok(asset)
    }

    /// Take cash out of a customer's usable balance and hand it to the
    /// payout gateway once the withdrawal is committed.
    pub async fn withdraw_cash(
        &self,
        username: &str,
        amount: Decimal,
        iban: &str,
    ) -> BrokerResult<Asset> {
        let iban = iban.trim();
        if iban.is_empty() {
            return Err(BrokerError::invalid("iban must not be blank"));
        }
        let customer_id = self.directory.resolve_customer_id(username)?;

        let asset = {
            let mut uow = self.ledger.begin();
            let asset = self
                .ledger
                .withdraw(&mut uow, customer_id, &self.config.cash_asset, amount)
                .await?;
            uow.commit()?;
            asset
        };

        info!(customer_id = %customer_id, amount = %amount, "cash withdrawn");
        self.payouts.send(customer_id, amount, iban);
        Ok(asset)
    }

    pub fn list_balances(&self, username: &str, asset_name: Option<&str>) -> BrokerResult<Vec<Asset>> {
        let customer_id = self.directory.resolve_customer_id(username)?;
        Ok(self.ledger.list(customer_id, asset_name))
    }

    pub async fn create_order(
        &self,
        username: &str,
        asset_name: &str,
        side: Side,
        price: Decimal,
        size: Decimal,
    ) -> BrokerResult<Order> {
        let customer_id = self.directory.resolve_customer_id(username)?;
        self.engine
            .create_order(customer_id, asset_name, side, price, size)
            .await
    }

    pub fn list_orders(&self, username: &str, filter: &OrderFilter) -> BrokerResult<Vec<Order>> {
        let customer_id = self.directory.resolve_customer_id(username)?;
        Ok(self.engine.list_orders(customer_id, filter))
    }

    pub async fn cancel_order(&self, order_id: OrderId, actor: &str) -> BrokerResult<Order> {
        self.engine.cancel_order(order_id, actor).await
    }

    pub async fn match_order(&self, order_id: OrderId) -> BrokerResult<Order> {
        self.engine.match_order(order_id).await
    }
}
