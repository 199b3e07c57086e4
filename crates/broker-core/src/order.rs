//! Order records and their lifecycle.
//!
//! ```text
//! PENDING --cancel--> CANCELLED   (terminal)
//! PENDING --match---> MATCHED     (terminal)
//! ```
//!
//! Orders are never deleted; the two terminal states have no outgoing
//! edges.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::{BrokerError, BrokerResult};
use crate::ids::{CustomerId, OrderId};
use crate::side::Side;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OrderStatus {
    Pending,
    Matched,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Matched => "MATCHED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(OrderStatus::Pending),
            "MATCHED" => Some(OrderStatus::Matched),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,

    /// The non-cash asset being traded.
    pub asset_name: String,
    pub side: Side,

    /// Unit price in cash, strictly positive.
    pub price: Decimal,

    /// Quantity of `asset_name`, strictly positive.
    pub size: Decimal,

    pub status: OrderStatus,

    /// Set once by the order store, never changed.
    pub created_at: DateTime<Utc>,

    /// Stored version this snapshot was read from (`0` = not stored yet).
    pub version: u64,
}

/// Cash value of `size` units at `price`. Fails instead of overflowing
/// `Decimal`.
pub fn notional(price: Decimal, size: Decimal) -> BrokerResult<Decimal> {
    price.checked_mul(size).ok_or_else(|| {
        BrokerError::invalid(format!("order value {} * {} is out of range", price, size))
    })
}

impl Order {
    pub fn is_pending(&self) -> bool {
        self.status == OrderStatus::Pending
    }

    /// Move a pending order to a terminal status.
    ///
    /// # Panics
    /// Panics if the order is not pending or `to` is not terminal.
    /// Callers only transition orders they looked up as pending under
    /// the order's asset lock.
    pub fn transition(&mut self, to: OrderStatus) {
        assert!(
            self.is_pending() && to.is_terminal(),
            "illegal order transition {} -> {} for order {}",
            self.status,
            to,
            self.id
        );
        self.status = to;
    }
}

/// Conjunctive, all-optional filter for order listings.
///
/// Date bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub min_date: Option<DateTime<Utc>>,
    pub max_date: Option<DateTime<Utc>>,
    pub side: Option<Side>,
    pub asset_name: Option<String>,
}

impl OrderFilter {
    pub fn matches(&self, order: &Order) -> bool {
        if let Some(min) = self.min_date {
            if order.created_at < min {
                return false;
            }
        }
        if let Some(max) = self.max_date {
            if order.created_at > max {
                return false;
            }
        }
        if let Some(side) = self.side {
            if order.side != side {
                return false;
            }
        }
        if let Some(name) = &self.asset_name {
            if &order.asset_name != name {
                return false;
            }
        }
        true
    }
}
