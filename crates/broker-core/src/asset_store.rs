//! Ledger store: keyed storage of balance records.
//!
//! Reads return owned snapshots. Writes never happen here directly;
//! they go through [`Storage::commit`](crate::storage::Storage::commit),
//! which checks each staged record's version against the stored one
//! (compare-and-swap) and bumps it on success.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockWriteGuard};

use crate::asset::{Asset, AssetKey};
use crate::error::{BrokerError, BrokerResult};
use crate::ids::CustomerId;

pub(crate) type AssetTable = HashMap<AssetKey, Asset>;

#[derive(Debug, Default)]
pub struct AssetStore {
    records: RwLock<AssetTable>,
}

impl AssetStore {
    pub fn new() -> Self {
        AssetStore::default()
    }

    /// Committed snapshot of one record, if it exists.
    pub fn get(&self, key: &AssetKey) -> Option<Asset> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// All records of a customer, optionally restricted to one asset
    /// name, sorted by asset name.
    pub fn list(&self, customer_id: CustomerId, asset_name: Option<&str>) -> Vec<Asset> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<Asset> = records
            .values()
            .filter(|a| a.customer_id() == customer_id)
            .filter(|a| asset_name.map_or(true, |name| a.name() == name))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.key.cmp(&b.key));
        out
    }

    pub fn is_empty(&self) -> bool {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    pub(crate) fn write_table(&self) -> RwLockWriteGuard<'_, AssetTable> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Every staged record must carry the version currently stored
/// (`0` for a record that must not exist yet).
pub(crate) fn check_versions(table: &AssetTable, writes: &[Asset]) -> BrokerResult<()> {
    for staged in writes {
        let stored = table.get(&staged.key).map_or(0, |a| a.version);
        if stored != staged.version {
            return Err(BrokerError::Conflict {
                resource: format!("asset {}", staged.key),
            });
        }
    }
    Ok(())
}

pub(crate) fn apply(table: &mut AssetTable, writes: Vec<Asset>) {
    for mut asset in writes {
        asset.version += 1;
        table.insert(asset.key.clone(), asset);
    }
}
