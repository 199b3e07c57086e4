//! Logical request/reply types exchanged with clients.
//!
//! These are transport-agnostic; [`csv_codec`](crate::csv_codec) turns
//! them into lines of text and back.

use broker_core::{
    Asset, BrokerError, ErrorKind, Order, OrderFilter, OrderId, OrderStatus, Side,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// A client request. `actor` is the already-authenticated username the
/// request is made as; `customer` is the username it targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Register a new CUSTOMER account.
    Register { username: String, password: String },

    Deposit {
        actor: String,
        customer: String,
        amount: Decimal,
    },

    Withdraw {
        actor: String,
        customer: String,
        amount: Decimal,
        iban: String,
    },

    CreateOrder {
        actor: String,
        customer: String,
        asset: String,
        side: Side,
        price: Decimal,
        size: Decimal,
    },

    ListOrders {
        actor: String,
        customer: String,
        filter: OrderFilter,
    },

    CancelOrder { actor: String, order_id: OrderId },

    MatchOrder { actor: String, order_id: OrderId },

    ListBalances {
        actor: String,
        customer: String,
        asset: Option<String>,
    },
}

impl Request {
    /// Username the request is made as, if any.
    pub fn actor(&self) -> Option<&str> {
        match self {
            Request::Register { .. } => None,
            Request::Deposit { actor, .. }
            | Request::Withdraw { actor, .. }
            | Request::CreateOrder { actor, .. }
            | Request::ListOrders { actor, .. }
            | Request::CancelOrder { actor, .. }
            | Request::MatchOrder { actor, .. }
            | Request::ListBalances { actor, .. } => Some(actor),
        }
    }
}

/// One order as reported to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub id: OrderId,
    pub customer: String,
    pub asset: String,
    pub side: Side,
    pub price: Decimal,
    pub size: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// One balance record as reported to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceLine {
    pub customer: String,
    pub asset: String,
    pub size: Decimal,
    pub usable_size: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The request succeeded; the text says what was done.
    Ok(String),
    Order(OrderLine),
    Balance(BalanceLine),
    /// Terminates a list reply; carries the number of items sent.
    End(usize),
    Error { kind: ErrorKind, message: String },
}

impl Reply {
    pub fn ok(what: impl Into<String>) -> Self {
        Reply::Ok(what.into())
    }

    pub fn order(order: &Order, customer: impl Into<String>) -> Self {
        Reply::Order(OrderLine {
            id: order.id,
            customer: customer.into(),
            asset: order.asset_name.clone(),
            side: order.side,
            price: order.price,
            size: order.size,
            status: order.status,
            created_at: order.created_at,
        })
    }

    pub fn balance(asset: &Asset, customer: impl Into<String>) -> Self {
        Reply::Balance(BalanceLine {
            customer: customer.into(),
            asset: asset.name().to_string(),
            size: asset.size,
            usable_size: asset.usable_size,
        })
    }

    pub fn error(err: &BrokerError) -> Self {
        Reply::Error {
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error { .. })
    }
}
