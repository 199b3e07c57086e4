//! Exclusive per-asset-key locks.
//!
//! One async mutex per [`AssetKey`], created on first use and kept for
//! the life of the registry (asset records are never deleted either).
//! Guards are owned so a unit of work can hold them across `.await`
//! points until it commits or is dropped.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

use crate::asset::AssetKey;

/// Proof that the holder owns the lock on `key`.
#[derive(Debug)]
pub struct AssetLockGuard {
    key: AssetKey,
    _guard: OwnedMutexGuard<()>,
}

impl AssetLockGuard {
    pub fn key(&self) -> &AssetKey {
        &self.key
    }
}

#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: DashMap<AssetKey, Arc<Mutex<()>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        LockRegistry::default()
    }

    /// Lock every key in `keys`, in ascending key order, skipping
    /// duplicates. Acquiring in one global order means two callers
    /// that need the same pair of keys can never each hold one and
    /// wait for the other.
    pub async fn acquire(&self, keys: impl IntoIterator<Item = AssetKey>) -> Vec<AssetLockGuard> {
        let mut keys: Vec<AssetKey> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            // Clone the Arc out so no map shard is held across the await.
            let mutex = self.locks.entry(key.clone()).or_default().clone();
            let guard = mutex.lock_owned().await;
            trace!(key = %key, "asset lock acquired");
            guards.push(AssetLockGuard { key, _guard: guard });
        }
        guards
    }
}
