//! Asset ledger: the balance operations.
//!
//! Every operation runs inside a caller-supplied [`UnitOfWork`], locks
//! the keys it touches (a no-op for keys the unit already holds), does
//! its check and its mutation under that lock, and stages the result.
//! The caller decides when the unit commits, so a reservation and the
//! order it backs land together or not at all.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::warn;

use crate::asset::{Asset, AssetKey};
use crate::error::{BrokerError, BrokerResult};
use crate::ids::CustomerId;
use crate::lock_registry::LockRegistry;
use crate::storage::Storage;
use crate::unit_of_work::UnitOfWork;

#[derive(Debug, Clone)]
pub struct AssetLedger {
    storage: Arc<Storage>,
    locks: Arc<LockRegistry>,
}

impl AssetLedger {
    pub fn new(storage: Arc<Storage>, locks: Arc<LockRegistry>) -> Self {
        AssetLedger { storage, locks }
    }

    /// Start a new unit of work against this ledger's stores.
    pub fn begin(&self) -> UnitOfWork<'_> {
        UnitOfWork::new(&self.storage, &self.locks)
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Lock the record for the rest of `uow` and return its snapshot,
    /// or `None` if it does not exist. No record is created.
    pub async fn lock_and_get(
        &self,
        uow: &mut UnitOfWork<'_>,
        customer_id: CustomerId,
        asset_name: &str,
    ) -> Option<Asset> {
        uow.lock_and_get(&AssetKey::new(customer_id, asset_name))
            .await
    }

    /// Add `amount` to `size` and `usable_size`, creating the record if
    /// it does not exist yet.
    pub async fn deposit(
        &self,
        uow: &mut UnitOfWork<'_>,
        customer_id: CustomerId,
        asset_name: &str,
        amount: Decimal,
    ) -> BrokerResult<Asset> {
        ensure_positive(amount, "deposit amount")?;
        let key = AssetKey::new(customer_id, asset_name);
        let mut asset = uow
            .lock_and_get(&key)
            .await
            .unwrap_or_else(|| Asset::empty(key));
        asset.credit(amount).inspect_err(|err| {
            warn!(customer_id = %customer_id, asset = asset_name, error = %err, "deposit rejected");
        })?;
        uow.stage_asset(asset.clone());
        Ok(asset)
    }

    /// Remove `amount` from `size` and `usable_size`.
    pub async fn withdraw(
        &self,
        uow: &mut UnitOfWork<'_>,
        customer_id: CustomerId,
        asset_name: &str,
        amount: Decimal,
    ) -> BrokerResult<Asset> {
        ensure_positive(amount, "withdraw amount")?;
        let mut asset = self
            .existing_or_insufficient(uow, customer_id, asset_name, amount)
            .await?;
        asset.debit(amount).inspect_err(|err| {
            warn!(customer_id = %customer_id, asset = asset_name, error = %err, "withdrawal rejected");
        })?;
        uow.stage_asset(asset.clone());
        Ok(asset)
    }

    /// Hold `amount` of `usable_size` against a pending order.
    pub async fn reserve(
        &self,
        uow: &mut UnitOfWork<'_>,
        customer_id: CustomerId,
        asset_name: &str,
        amount: Decimal,
    ) -> BrokerResult<Asset> {
        ensure_positive(amount, "reservation amount")?;
        let mut asset = self
            .existing_or_insufficient(uow, customer_id, asset_name, amount)
            .await?;
        asset.reserve(amount).inspect_err(|err| {
            warn!(customer_id = %customer_id, asset = asset_name, error = %err, "reservation rejected");
        })?;
        uow.stage_asset(asset.clone());
        Ok(asset)
    }

    /// Give a held `amount` back to `usable_size`.
    ///
    /// # Panics
    /// Panics if the record does not exist or holds less than `amount`:
    /// both mean the caller is releasing something it never reserved.
    pub async fn release(
        &self,
        uow: &mut UnitOfWork<'_>,
        customer_id: CustomerId,
        asset_name: &str,
        amount: Decimal,
    ) -> BrokerResult<Asset> {
        ensure_positive(amount, "release amount")?;
        let key = AssetKey::new(customer_id, asset_name);
        let Some(mut asset) = uow.lock_and_get(&key).await else {
            panic!("release of {} on missing asset {}", amount, key);
        };
        asset.release(amount);
        uow.stage_asset(asset.clone());
        Ok(asset)
    }

    /// Settlement: remove `reserved` (already held) from `from`'s total
    /// and credit `delivered` to `to`, creating `to` if needed.
    ///
    /// Both keys are locked in global key order regardless of which one
    /// is paying. The check on `from` is against total `size`: the
    /// amount left `usable_size` when it was reserved, so failing here
    /// means the stores disagree, not that the customer is short.
    pub async fn settle_transfer(
        &self,
        uow: &mut UnitOfWork<'_>,
        from: &AssetKey,
        to: &AssetKey,
        reserved: Decimal,
        delivered: Decimal,
    ) -> BrokerResult<(Asset, Asset)> {
        ensure_positive(reserved, "reserved amount")?;
        ensure_positive(delivered, "delivered amount")?;
        if from == to {
            return Err(BrokerError::invalid(format!(
                "settlement needs two distinct assets, got {} twice",
                from
            )));
        }

        uow.lock([from.clone(), to.clone()]).await;

        let mut source = uow.asset(from).ok_or_else(|| {
            warn!(asset = %from, "settlement source missing");
            BrokerError::insufficient(&from.asset_name, reserved, Decimal::ZERO)
        })?;
        source.consume_reserved(reserved).inspect_err(|err| {
            warn!(asset = %from, error = %err, "settlement sanity check failed");
        })?;

        let mut target = uow.asset(to).unwrap_or_else(|| Asset::empty(to.clone()));
        target.credit(delivered).inspect_err(|err| {
            warn!(asset = %to, error = %err, "settlement credit rejected");
        })?;

        uow.stage_asset(source.clone());
        uow.stage_asset(target.clone());
        Ok((source, target))
    }

    /// Committed balances of a customer, optionally one asset only.
    /// Pure read, takes no locks.
    pub fn list(&self, customer_id: CustomerId, asset_name: Option<&str>) -> Vec<Asset> {
        self.storage.assets.list(customer_id, asset_name)
    }

    async fn existing_or_insufficient(
        &self,
        uow: &mut UnitOfWork<'_>,
        customer_id: CustomerId,
        asset_name: &str,
        amount: Decimal,
    ) -> BrokerResult<Asset> {
        let key = AssetKey::new(customer_id, asset_name);
        uow.lock_and_get(&key).await.ok_or_else(|| {
            warn!(customer_id = %customer_id, asset = asset_name, "no balance record");
            BrokerError::insufficient(asset_name, amount, Decimal::ZERO)
        })
    }
}

pub(crate) fn ensure_positive(value: Decimal, what: &str) -> BrokerResult<()> {
    if value > Decimal::ZERO {
        Ok(())
    } else {
        Err(BrokerError::invalid(format!(
            "{} must be positive, got {}",
            what, value
        )))
    }
}
