//! Atomic unit of work over the ledger and order stores.
//!
//! A unit collects asset-key locks and staged writes. Nothing becomes
//! visible to other callers until [`UnitOfWork::commit`] succeeds;
//! dropping the unit (early return, `?`, panic) aborts it and releases
//! its locks.
//!
//! Asset records may only be read or staged while their key is locked
//! by this unit. Keys must be locked in ascending order across calls:
//! lock every key the unit needs in one [`UnitOfWork::lock`] call, or
//! in calls of increasing key order.

use std::collections::BTreeMap;
use std::mem;

use tracing::debug;

use crate::asset::{Asset, AssetKey};
use crate::error::BrokerResult;
use crate::ids::OrderId;
use crate::lock_registry::{AssetLockGuard, LockRegistry};
use crate::order::{Order, OrderStatus};
use crate::storage::Storage;

pub struct UnitOfWork<'a> {
    storage: &'a Storage,
    locks: &'a LockRegistry,

    /// Held lock guards, ascending by key.
    held: Vec<AssetLockGuard>,

    staged_assets: BTreeMap<AssetKey, Asset>,
    staged_orders: BTreeMap<OrderId, Order>,
    committed: bool,
}

impl<'a> UnitOfWork<'a> {
    pub fn new(storage: &'a Storage, locks: &'a LockRegistry) -> Self {
        UnitOfWork {
            storage,
            locks,
            held: Vec::new(),
            staged_assets: BTreeMap::new(),
            staged_orders: BTreeMap::new(),
            committed: false,
        }
    }

    pub fn holds(&self, key: &AssetKey) -> bool {
        self.held.iter().any(|g| g.key() == key)
    }

    /// Lock `keys` for the rest of this unit. Keys already held are
    /// skipped.
    ///
    /// # Panics
    /// Panics if a new key sorts below a key this unit already holds;
    /// acquiring out of the global order could deadlock.
    pub async fn lock(&mut self, keys: impl IntoIterator<Item = AssetKey>) {
        let mut wanted: Vec<AssetKey> = keys.into_iter().filter(|k| !self.holds(k)).collect();
        if wanted.is_empty() {
            return;
        }
        wanted.sort();
        wanted.dedup();

        if let Some(highest) = self.held.last() {
            assert!(
                &wanted[0] > highest.key(),
                "lock order violation: {} requested while holding {}",
                wanted[0],
                highest.key()
            );
        }

        let guards = self.locks.acquire(wanted).await;
        self.held.extend(guards);
    }

    /// Lock `key` and return the record as this unit sees it.
    pub async fn lock_and_get(&mut self, key: &AssetKey) -> Option<Asset> {
        self.lock([key.clone()]).await;
        self.asset(key)
    }

    /// The staged version of a record if this unit wrote it, otherwise
    /// the committed one.
    ///
    /// # Panics
    /// Panics if `key` is not locked by this unit.
    pub fn asset(&self, key: &AssetKey) -> Option<Asset> {
        assert!(self.holds(key), "asset {} read without its lock", key);
        self.staged_assets
            .get(key)
            .cloned()
            .or_else(|| self.storage.assets.get(key))
    }

    /// # Panics
    /// Panics if the record's key is not locked by this unit.
    pub fn stage_asset(&mut self, asset: Asset) {
        assert!(
            self.holds(&asset.key),
            "asset {} written without its lock",
            asset.key
        );
        self.staged_assets.insert(asset.key.clone(), asset);
    }

    pub fn order(&self, id: OrderId) -> Option<Order> {
        self.staged_orders
            .get(&id)
            .cloned()
            .or_else(|| self.storage.orders.get(id))
    }

    /// Lookup scoped to PENDING orders; anything else reads as absent.
    pub fn pending_order(&self, id: OrderId) -> Option<Order> {
        self.order(id).filter(|o| o.status == OrderStatus::Pending)
    }

    pub fn stage_order(&mut self, order: Order) {
        self.staged_orders.insert(order.id, order);
    }

    /// Persist every staged record atomically, then release the locks.
    pub fn commit(mut self) -> BrokerResult<()> {
        let assets: Vec<Asset> = mem::take(&mut self.staged_assets).into_values().collect();
        let orders: Vec<Order> = mem::take(&mut self.staged_orders).into_values().collect();
        let (asset_count, order_count) = (assets.len(), orders.len());

        self.storage.commit(assets, orders)?;
        self.committed = true;
        debug!(
            assets = asset_count,
            orders = order_count,
            locks = self.held.len(),
            "unit of work committed"
        );
        Ok(())
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        if !self.committed && !(self.staged_assets.is_empty() && self.staged_orders.is_empty()) {
            debug!(
                assets = self.staged_assets.len(),
                orders = self.staged_orders.len(),
                "unit of work aborted, staged writes discarded"
            );
        }
    }
}
