//! Order store: keyed storage of order records.
//!
//! Ids and creation timestamps are assigned here when an order is
//! drafted, so the caller gets them back before the commit; an aborted
//! unit simply leaves a gap in the id sequence.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockWriteGuard};

use chrono::Utc;
use rust_decimal::Decimal;

use crate::error::{BrokerError, BrokerResult};
use crate::ids::{CustomerId, OrderId};
use crate::order::{Order, OrderFilter, OrderStatus};
use crate::side::Side;

pub(crate) type OrderTable = BTreeMap<OrderId, Order>;

#[derive(Debug)]
pub struct OrderStore {
    records: RwLock<OrderTable>,
    next_id: AtomicU64,
}

impl Default for OrderStore {
    fn default() -> Self {
        OrderStore {
            records: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl OrderStore {
    pub fn new() -> Self {
        OrderStore::default()
    }

    /// A new PENDING order with a fresh id and `created_at = now`.
    /// Nothing is stored until the enclosing unit of work commits.
    pub fn draft(
        &self,
        customer_id: CustomerId,
        asset_name: &str,
        side: Side,
        price: Decimal,
        size: Decimal,
    ) -> Order {
        let id = OrderId(self.next_id.fetch_add(1, Ordering::Relaxed));
        Order {
            id,
            customer_id,
            asset_name: asset_name.to_string(),
            side,
            price,
            size,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            version: 0,
        }
    }

    pub fn get(&self, id: OrderId) -> Option<Order> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Lookup scoped to one status; anything else reads as absent.
    pub fn find_by_id_and_status(&self, id: OrderId, status: OrderStatus) -> Option<Order> {
        self.get(id).filter(|o| o.status == status)
    }

    /// All of a customer's orders matching `filter`, ascending by id.
    pub fn find(&self, customer_id: CustomerId, filter: &OrderFilter) -> Vec<Order> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|o| o.customer_id == customer_id && filter.matches(o))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn write_table(&self) -> RwLockWriteGuard<'_, OrderTable> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) fn check_versions(table: &OrderTable, writes: &[Order]) -> BrokerResult<()> {
    for staged in writes {
        let stored = table.get(&staged.id).map_or(0, |o| o.version);
        if stored != staged.version {
            return Err(BrokerError::Conflict {
                resource: format!("order {}", staged.id),
            });
        }
    }
    Ok(())
}

pub(crate) fn apply(table: &mut OrderTable, writes: Vec<Order>) {
    for mut order in writes {
        order.version += 1;
        table.insert(order.id, order);
    }
}
