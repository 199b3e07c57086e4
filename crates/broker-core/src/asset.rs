//! Balance records ("assets").
//!
//! An [`Asset`] is one customer's holding of one named instrument,
//! cash included. Two quantities are tracked:
//!
//! - `size`: everything the customer owns,
//! - `usable_size`: the part of `size` not held against a pending order.
//!
//! Invariant: `0 <= usable_size <= size`. The mutators below check
//! their business preconditions and return an error when they fail;
//! once a mutation has been applied the invariant is asserted, so a
//! violation panics instead of being persisted.

use std::fmt;

use rust_decimal::Decimal;

use crate::error::{BrokerError, BrokerResult};
use crate::ids::CustomerId;

/// Key of a balance record. Ordered by customer id, then asset name;
/// this order is the global lock-acquisition order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AssetKey {
    pub customer_id: CustomerId,
    pub asset_name: String,
}

impl AssetKey {
    pub fn new(customer_id: CustomerId, asset_name: impl Into<String>) -> Self {
        AssetKey {
            customer_id,
            asset_name: asset_name.into(),
        }
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.customer_id, self.asset_name)
    }
}

/// A balance record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub key: AssetKey,
    pub size: Decimal,
    pub usable_size: Decimal,

    /// Version of the stored record this snapshot was read from.
    /// `0` means "not stored yet"; the store bumps it on every commit.
    pub version: u64,
}

impl Asset {
    /// A fresh, empty record. Records are created lazily with zero
    /// balances on first deposit or first incoming settlement.
    pub fn empty(key: AssetKey) -> Self {
        Asset {
            key,
            size: Decimal::ZERO,
            usable_size: Decimal::ZERO,
            version: 0,
        }
    }

    pub fn customer_id(&self) -> CustomerId {
        self.key.customer_id
    }

    pub fn name(&self) -> &str {
        &self.key.asset_name
    }

    /// `0 <= usable_size <= size`.
    pub fn check_invariant(&self) -> bool {
        self.usable_size >= Decimal::ZERO && self.usable_size <= self.size
    }

    /// Quantity currently held against pending orders.
    pub fn reserved(&self) -> Decimal {
        self.size - self.usable_size
    }

    /// Increase both `size` and `usable_size`. A credit that would not
    /// fit in a `Decimal` is rejected and leaves the record unchanged.
    pub fn credit(&mut self, amount: Decimal) -> BrokerResult<()> {
        assert!(amount > Decimal::ZERO, "credit amount must be positive");
        let overflow = || {
            BrokerError::invalid(format!(
                "credit of {} to {} exceeds the representable balance",
                amount, self.key
            ))
        };
        let size = self.size.checked_add(amount).ok_or_else(overflow)?;
        let usable_size = self.usable_size.checked_add(amount).ok_or_else(overflow)?;
        self.size = size;
        self.usable_size = usable_size;
        self.assert_invariant("credit");
        Ok(())
    }

    /// Decrease both `size` and `usable_size`; fails unless
    /// `usable_size >= amount`.
    pub fn debit(&mut self, amount: Decimal) -> BrokerResult<()> {
        if self.usable_size < amount {
            return Err(BrokerError::insufficient(
                self.name(),
                amount,
                self.usable_size,
            ));
        }
        self.size -= amount;
        self.usable_size -= amount;
        self.assert_invariant("debit");
        Ok(())
    }

    /// Hold `amount` against a pending order: `usable_size` only.
    pub fn reserve(&mut self, amount: Decimal) -> BrokerResult<()> {
        if self.usable_size < amount {
            return Err(BrokerError::insufficient(
                self.name(),
                amount,
                self.usable_size,
            ));
        }
        self.usable_size -= amount;
        self.assert_invariant("reserve");
        Ok(())
    }

    /// Inverse of [`Asset::reserve`].
    ///
    /// # Panics
    /// Panics if the release would push `usable_size` above `size`:
    /// that amount was never reserved.
    pub fn release(&mut self, amount: Decimal) {
        assert!(
            self.usable_size + amount <= self.size,
            "release of {} on {} exceeds reserved {}",
            amount,
            self.key,
            self.reserved()
        );
        self.usable_size += amount;
        self.assert_invariant("release");
    }

    /// Remove a previously reserved `amount` permanently: `size` drops,
    /// `usable_size` is untouched because the hold already excluded it.
    ///
    /// The check is against total `size`; failing it means the ledger
    /// and the order store disagree about what was reserved.
    pub fn consume_reserved(&mut self, amount: Decimal) -> BrokerResult<()> {
        if self.size < amount {
            return Err(BrokerError::insufficient(self.name(), amount, self.size));
        }
        self.size -= amount;
        // A held amount is always part of size - usable_size; if not,
        // usable_size would now exceed size.
        self.assert_invariant("consume_reserved");
        Ok(())
    }

    fn assert_invariant(&self, op: &str) {
        assert!(
            self.check_invariant(),
            "asset invariant violated after {}: {} size={} usable={}",
            op,
            self.key,
            self.size,
            self.usable_size
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn cash(size: Decimal, usable: Decimal) -> Asset {
        Asset {
            key: AssetKey::new(CustomerId(1), "TRY"),
            size,
            usable_size: usable,
            version: 1,
        }
    }

    #[test]
    fn reserve_keeps_size() {
        let mut a = cash(dec!(1000), dec!(1000));
        a.reserve(dec!(50)).unwrap();
        assert_eq!(a.size, dec!(1000));
        assert_eq!(a.usable_size, dec!(950));
        assert_eq!(a.reserved(), dec!(50));
    }

    #[test]
    fn reserve_beyond_usable_is_rejected_without_change() {
        let mut a = cash(dec!(1000), dec!(100));
        let before = a.clone();
        let err = a.reserve(dec!(100.01)).unwrap_err();
        assert!(matches!(err, BrokerError::InsufficientBalance { .. }));
        assert_eq!(a, before);
    }

    #[test]
    fn credit_past_decimal_range_is_rejected_without_change() {
        let mut a = cash(Decimal::MAX, Decimal::MAX);
        let before = a.clone();
        let err = a.credit(dec!(1)).unwrap_err();
        assert!(matches!(err, BrokerError::InvalidArgument(_)));
        assert_eq!(a, before);
    }

    #[test]
    fn debit_checks_usable_not_total() {
        let mut a = cash(dec!(1000), dec!(400));
        assert!(a.debit(dec!(500)).is_err());
        a.debit(dec!(400)).unwrap();
        assert_eq!(a.size, dec!(600));
        assert_eq!(a.usable_size, dec!(0));
    }

    #[test]
    fn consume_reserved_removes_from_total_only() {
        let mut a = cash(dec!(1000), dec!(1000));
        a.reserve(dec!(50)).unwrap();
        a.consume_reserved(dec!(50)).unwrap();
        assert_eq!(a.size, dec!(950));
        assert_eq!(a.usable_size, dec!(950));
    }

    #[test]
    #[should_panic(expected = "exceeds reserved")]
    fn release_more_than_reserved_panics() {
        let mut a = cash(dec!(1000), dec!(990));
        a.release(dec!(20));
    }

    #[test]
    #[should_panic(expected = "invariant violated")]
    fn consuming_unreserved_quantity_panics() {
        let mut a = cash(dec!(1000), dec!(1000));
        let _ = a.consume_reserved(dec!(10));
    }
}
