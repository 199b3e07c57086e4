//! Outbound cash transfers after a committed withdrawal.

use rust_decimal::Decimal;
use tracing::info;

use crate::ids::CustomerId;

/// Hands withdrawn cash to the outside world (bank transfer, etc.).
///
/// Called only after the withdrawal's unit of work has committed and
/// its locks are released.
pub trait PayoutGateway: Send + Sync {
    fn send(&self, customer_id: CustomerId, amount: Decimal, iban: &str);
}

/// Default gateway: records the payout in the log and nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingPayoutGateway;

impl PayoutGateway for LoggingPayoutGateway {
    fn send(&self, customer_id: CustomerId, amount: Decimal, iban: &str) {
        info!(customer_id = %customer_id, amount = %amount, iban, "payout requested");
    }
}
