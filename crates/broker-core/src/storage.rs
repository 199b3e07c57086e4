//! The two stores behind one atomic commit.
//!
//! Balance changes and order changes made in the same unit of work are
//! either both visible or both absent. [`Storage::commit`] takes the
//! write side of both tables (assets first, then orders), validates
//! every staged version, and only then applies anything.

use tracing::error;

use crate::asset::Asset;
use crate::asset_store::{self, AssetStore};
use crate::error::BrokerResult;
use crate::order::Order;
use crate::order_store::{self, OrderStore};

#[derive(Debug, Default)]
pub struct Storage {
    pub assets: AssetStore,
    pub orders: OrderStore,
}

impl Storage {
    pub fn new() -> Self {
        Storage::default()
    }

    /// Compare-and-swap commit of staged asset and order records.
    ///
    /// On `Conflict` nothing from either list has been written.
    pub fn commit(&self, assets: Vec<Asset>, orders: Vec<Order>) -> BrokerResult<()> {
        let mut asset_table = self.assets.write_table();
        let mut order_table = self.orders.write_table();

        let checked = asset_store::check_versions(&asset_table, &assets)
            .and_then(|_| order_store::check_versions(&order_table, &orders));
        if let Err(err) = checked {
            error!(error = %err, "commit rejected, unit of work aborted");
            return Err(err);
        }

        asset_store::apply(&mut asset_table, assets);
        order_store::apply(&mut order_table, orders);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetKey;
    use crate::error::BrokerError;
    use crate::ids::CustomerId;
    use crate::side::Side;
    use rust_decimal_macros::dec;

    fn funded(key: &AssetKey, amount: rust_decimal::Decimal) -> Asset {
        let mut a = Asset::empty(key.clone());
        a.credit(amount).unwrap();
        a
    }

    #[test]
    fn commit_bumps_versions() {
        let storage = Storage::new();
        let key = AssetKey::new(CustomerId(1), "TRY");
        storage.commit(vec![funded(&key, dec!(10))], vec![]).unwrap();
        assert_eq!(storage.assets.get(&key).unwrap().version, 1);
    }

    #[test]
    fn stale_asset_write_aborts_the_order_write_too() {
        let storage = Storage::new();
        let key = AssetKey::new(CustomerId(1), "TRY");
        storage.commit(vec![funded(&key, dec!(10))], vec![]).unwrap();

        // Two writers read version 1; the first one wins.
        let mut first = storage.assets.get(&key).unwrap();
        let mut second = first.clone();
        first.reserve(dec!(4)).unwrap();
        second.reserve(dec!(8)).unwrap();
        storage.commit(vec![first], vec![]).unwrap();

        let order = storage
            .orders
            .draft(CustomerId(1), "X", Side::Buy, dec!(1), dec!(8));
        let err = storage.commit(vec![second], vec![order.clone()]).unwrap_err();
        assert!(matches!(err, BrokerError::Conflict { .. }));
        assert!(err.is_retryable());

        assert_eq!(storage.assets.get(&key).unwrap().usable_size, dec!(6));
        assert!(storage.orders.get(order.id).is_none());
    }

    #[test]
    fn inserting_an_existing_record_as_new_conflicts() {
        let storage = Storage::new();
        let key = AssetKey::new(CustomerId(1), "TRY");
        storage.commit(vec![funded(&key, dec!(10))], vec![]).unwrap();
        let err = storage
            .commit(vec![funded(&key, dec!(5))], vec![])
            .unwrap_err();
        assert!(matches!(err, BrokerError::Conflict { .. }));
        assert_eq!(storage.assets.get(&key).unwrap().size, dec!(10));
    }
}
