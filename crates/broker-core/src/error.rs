//! Error types for the brokerage core.
//!
//! Every lifecycle operation returns a [`BrokerResult`]. Business
//! rejections are values, not panics; a panic inside the core always
//! means a broken ledger invariant (a bug), never bad input.

use std::fmt;

use thiserror::Error;

/// Errors reported synchronously to the caller of a core operation.
///
/// Only [`BrokerError::Conflict`] may be retried by re-issuing the same
/// request; every other variant is permanent for the given input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// Unknown customer, order, or asset.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Reservation, withdrawal, or settlement check failed.
    #[error("insufficient balance for asset {asset}: required {required}, available {available}")]
    InsufficientBalance {
        asset: String,
        required: String,
        available: String,
    },

    /// Non-positive amount/size/price, blank name, unrecognized side.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A competing writer committed first; nothing from this unit persisted.
    #[error("concurrent update of {resource}, retry the request")]
    Conflict { resource: String },

    /// The actor may not act on the target customer.
    #[error("{actor} is not allowed to {action}")]
    Unauthorized { actor: String, action: &'static str },

    /// Registration with a username that is already taken.
    #[error("customer already exists: {username}")]
    CustomerExists { username: String },
}

/// Result alias used throughout the core.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Discriminant of a [`BrokerError`], with a stable upper-snake code
/// that the wire protocol reports to clients.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InsufficientBalance,
    InvalidArgument,
    Conflict,
    Unauthorized,
    CustomerExists,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::InsufficientBalance => "INSUFFICIENT_BALANCE",
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::CustomerExists => "CUSTOMER_EXISTS",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "NOT_FOUND" => Some(ErrorKind::NotFound),
            "INSUFFICIENT_BALANCE" => Some(ErrorKind::InsufficientBalance),
            "INVALID_ARGUMENT" => Some(ErrorKind::InvalidArgument),
            "CONFLICT" => Some(ErrorKind::Conflict),
            "UNAUTHORIZED" => Some(ErrorKind::Unauthorized),
            "CUSTOMER_EXISTS" => Some(ErrorKind::CustomerExists),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl BrokerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BrokerError::NotFound { .. } => ErrorKind::NotFound,
            BrokerError::InsufficientBalance { .. } => ErrorKind::InsufficientBalance,
            BrokerError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            BrokerError::Conflict { .. } => ErrorKind::Conflict,
            BrokerError::Unauthorized { .. } => ErrorKind::Unauthorized,
            BrokerError::CustomerExists { .. } => ErrorKind::CustomerExists,
        }
    }

    /// `true` only for [`BrokerError::Conflict`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, BrokerError::Conflict { .. })
    }

    pub(crate) fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        BrokerError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn insufficient(
        asset: &str,
        required: impl fmt::Display,
        available: impl fmt::Display,
    ) -> Self {
        BrokerError::InsufficientBalance {
            asset: asset.to_string(),
            required: required.to_string(),
            available: available.to_string(),
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        BrokerError::InvalidArgument(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_conflict_is_retryable() {
        let conflict = BrokerError::Conflict {
            resource: "asset 1/TRY".to_string(),
        };
        assert!(conflict.is_retryable());
        assert!(!BrokerError::invalid("size must be positive").is_retryable());
        assert!(!BrokerError::insufficient("TRY", 10, 5).is_retryable());
    }

    #[test]
    fn insufficient_balance_display_names_the_asset() {
        let err = BrokerError::insufficient("TRY", "1500", "1000");
        let text = err.to_string();
        assert!(text.contains("TRY"));
        assert!(text.contains("1500"));
        assert_eq!(err.kind(), ErrorKind::InsufficientBalance);
    }

    #[test]
    fn kind_codes_parse_back() {
        for kind in [
            ErrorKind::NotFound,
            ErrorKind::InsufficientBalance,
            ErrorKind::InvalidArgument,
            ErrorKind::Conflict,
            ErrorKind::Unauthorized,
            ErrorKind::CustomerExists,
        ] {
            assert_eq!(ErrorKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(ErrorKind::from_code("BOGUS"), None);
    }
}
