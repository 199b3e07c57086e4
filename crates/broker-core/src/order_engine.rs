//! Order lifecycle: create, list, cancel, match.
//!
//! Each mutating operation is one unit of work: lock the asset key(s)
//! the order reserves against, re-read the order under that lock,
//! mutate balances through the [`AssetLedger`], flip the order status,
//! and commit both together.
//!
//! An order's customer, side, asset, price and size never change, so
//! the keys to lock can be derived from an unlocked read; the status is
//! re-checked once the lock is held. Every status change of an order
//! happens under the lock of its reservation key, which serializes
//! concurrent cancel/match calls on the same order.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::asset::AssetKey;
use crate::customer::CustomerDirectory;
use crate::error::{BrokerError, BrokerResult};
use crate::ids::{CustomerId, OrderId};
use crate::ledger::{ensure_positive, AssetLedger};
use crate::order::{notional, Order, OrderFilter, OrderStatus};
use crate::side::Side;

/// The two balance legs of an order.
///
/// - `reserve`: the asset held at creation (cash for a BUY, the traded
///   asset for a SELL) and how much of it.
/// - `counter`: the asset credited at match time and how much of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLegs {
    pub reserve: AssetKey,
    pub reserve_amount: Decimal,
    pub counter: AssetKey,
    pub deliver_amount: Decimal,
}

pub struct OrderEngine {
    ledger: AssetLedger,
    directory: Arc<dyn CustomerDirectory>,
    cash_asset: String,
}

impl OrderEngine {
    pub fn new(
        ledger: AssetLedger,
        directory: Arc<dyn CustomerDirectory>,
        cash_asset: impl Into<String>,
    ) -> Self {
        OrderEngine {
            ledger,
            directory,
            cash_asset: cash_asset.into(),
        }
    }

    pub fn cash_asset(&self) -> &str {
        &self.cash_asset
    }

    /// Reservation and counter legs for an order with these terms.
    /// Fails with `InvalidArgument` when `price * size` is out of range.
    pub fn legs(
        &self,
        customer_id: CustomerId,
        side: Side,
        asset_name: &str,
        price: Decimal,
        size: Decimal,
    ) -> BrokerResult<OrderLegs> {
        let cash = AssetKey::new(customer_id, self.cash_asset.as_str());
        let traded = AssetKey::new(customer_id, asset_name);
        let notional = notional(price, size)?;
        Ok(match side {
            Side::Buy => OrderLegs {
                reserve: cash,
                reserve_amount: notional,
                counter: traded,
                deliver_amount: size,
            },
            Side::Sell => OrderLegs {
                reserve: traded,
                reserve_amount: size,
                counter: cash,
                deliver_amount: notional,
            },
        })
    }

    fn legs_of(&self, order: &Order) -> BrokerResult<OrderLegs> {
        self.legs(
            order.customer_id,
            order.side,
            &order.asset_name,
            order.price,
            order.size,
        )
    }

    /// Reserve the order's funds and persist it as PENDING.
    ///
    /// Fails with `NotFound` when the reservation asset has no record
    /// and `InsufficientBalance` when its usable size is too small; in
    /// both cases no order is stored.
    pub async fn create_order(
        &self,
        customer_id: CustomerId,
        asset_name: &str,
        side: Side,
        price: Decimal,
        size: Decimal,
    ) -> BrokerResult<Order> {
        let asset_name = asset_name.trim();
        if asset_name.is_empty() {
            return Err(BrokerError::invalid("asset name must not be blank"));
        }
        if asset_name == self.cash_asset {
            return Err(BrokerError::invalid(format!(
                "{} is the cash asset and cannot be traded",
                asset_name
            )));
        }
        ensure_positive(price, "price")?;
        ensure_positive(size, "size")?;

        let legs = self.legs(customer_id, side, asset_name, price, size)?;

        let mut uow = self.ledger.begin();
        if uow.lock_and_get(&legs.reserve).await.is_none() {
            warn!(customer_id = %customer_id, asset = %legs.reserve.asset_name, "reservation asset not found");
            return Err(BrokerError::not_found("asset", &legs.reserve));
        }
        self.ledger
            .reserve(
                &mut uow,
                customer_id,
                &legs.reserve.asset_name,
                legs.reserve_amount,
            )
            .await?;

        let mut order = self
            .ledger
            .storage()
            .orders
            .draft(customer_id, asset_name, side, price, size);
        uow.stage_order(order.clone());
        uow.commit()?;
        // Stored version after the commit.
        order.version += 1;

        info!(
            order_id = %order.id,
            customer_id = %customer_id,
            side = %side,
            asset = asset_name,
            price = %price,
            size = %size,
            "order created"
        );
        Ok(order)
    }

    /// The customer's orders matching `filter`, ascending by id. Pure
    /// read of committed state.
    pub fn list_orders(&self, customer_id: CustomerId, filter: &OrderFilter) -> Vec<Order> {
        self.ledger.storage().orders.find(customer_id, filter)
    }

    /// Cancel a pending order and release what it reserved.
    ///
    /// `NotFound` covers both "no such order" and "order no longer
    /// pending". `requester` must own the order or be an ADMIN.
    pub async fn cancel_order(&self, order_id: OrderId, requester: &str) -> BrokerResult<Order> {
        let peek = self.find_pending(order_id)?;
        if !self.directory.may_act(requester, peek.customer_id) {
            warn!(order_id = %order_id, requester, "cancel refused");
            return Err(BrokerError::Unauthorized {
                actor: requester.to_string(),
                action: "cancel this order",
            });
        }
        let legs = self.legs_of(&peek)?;

        let mut uow = self.ledger.begin();
        uow.lock([legs.reserve.clone()]).await;
        let mut order = uow
            .pending_order(order_id)
            .ok_or_else(|| BrokerError::not_found("pending order", order_id))?;

        self.ledger
            .release(
                &mut uow,
                legs.reserve.customer_id,
                &legs.reserve.asset_name,
                legs.reserve_amount,
            )
            .await?;
        order.transition(OrderStatus::Cancelled);
        uow.stage_order(order.clone());
        uow.commit()?;
        order.version += 1;

        info!(order_id = %order_id, requester, released = %legs.reserve_amount, "order cancelled");
        Ok(order)
    }

    /// Settle a pending order against its owner's own balances.
    ///
    /// Not idempotent: a second call finds no pending order and fails
    /// with `NotFound`, so a retried match can never settle twice.
    pub async fn match_order(&self, order_id: OrderId) -> BrokerResult<Order> {
        let peek = self.find_pending(order_id)?;
        let legs = self.legs_of(&peek)?;

        let mut uow = self.ledger.begin();
        uow.lock([legs.reserve.clone(), legs.counter.clone()]).await;
        let mut order = uow
            .pending_order(order_id)
            .ok_or_else(|| BrokerError::not_found("pending order", order_id))?;

        self.ledger
            .settle_transfer(
                &mut uow,
                &legs.reserve,
                &legs.counter,
                legs.reserve_amount,
                legs.deliver_amount,
            )
            .await?;
        order.transition(OrderStatus::Matched);
        uow.stage_order(order.clone());
        uow.commit()?;
        order.version += 1;

        info!(
            order_id = %order_id,
            customer_id = %order.customer_id,
            removed = %legs.reserve_amount,
            delivered = %legs.deliver_amount,
            "order matched"
        );
        Ok(order)
    }

    fn find_pending(&self, order_id: OrderId) -> BrokerResult<Order> {
        self.ledger
            .storage()
            .orders
            .find_by_id_and_status(order_id, OrderStatus::Pending)
            .ok_or_else(|| {
                warn!(order_id = %order_id, "no pending order");
                BrokerError::not_found("pending order", order_id)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::customer::InMemoryDirectory;
    use crate::lock_registry::LockRegistry;
    use crate::storage::Storage;
    use rust_decimal_macros::dec;

    fn engine() -> OrderEngine {
        let ledger = AssetLedger::new(Arc::new(Storage::new()), Arc::new(LockRegistry::new()));
        OrderEngine::new(ledger, Arc::new(InMemoryDirectory::new()), "TRY")
    }

    #[test]
    fn buy_reserves_cash_and_receives_asset() {
        let legs = engine()
            .legs(CustomerId(1), Side::Buy, "X", dec!(10), dec!(5))
            .unwrap();
        assert_eq!(legs.reserve, AssetKey::new(CustomerId(1), "TRY"));
        assert_eq!(legs.reserve_amount, dec!(50));
        assert_eq!(legs.counter, AssetKey::new(CustomerId(1), "X"));
        assert_eq!(legs.deliver_amount, dec!(5));
    }

    #[test]
    fn sell_reserves_asset_and_receives_cash() {
        let legs = engine()
            .legs(CustomerId(1), Side::Sell, "X", dec!(10), dec!(5))
            .unwrap();
        assert_eq!(legs.reserve, AssetKey::new(CustomerId(1), "X"));
        assert_eq!(legs.reserve_amount, dec!(5));
        assert_eq!(legs.counter, AssetKey::new(CustomerId(1), "TRY"));
        assert_eq!(legs.deliver_amount, dec!(50));
    }

    #[tokio::test]
    async fn trading_the_cash_asset_is_invalid() {
        let err = engine()
            .create_order(CustomerId(1), "TRY", Side::Buy, dec!(1), dec!(1))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn order_value_out_of_range_is_invalid() {
        let err = engine()
            .create_order(CustomerId(1), "X", Side::Buy, Decimal::MAX, dec!(2))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn non_positive_price_or_size_is_invalid() {
        let engine = engine();
        for (price, size) in [(dec!(0), dec!(1)), (dec!(1), dec!(0)), (dec!(-2), dec!(1))] {
            let err = engine
                .create_order(CustomerId(1), "X", Side::Buy, price, size)
                .await
                .unwrap_err();
            assert!(matches!(err, BrokerError::InvalidArgument(_)));
        }
    }
}
