//! Core configuration.

/// Cash asset name used when none is configured.
pub const DEFAULT_CASH_ASSET: &str = "TRY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Name of the distinguished cash asset: BUY orders reserve it,
    /// SELL orders are paid in it, deposits and withdrawals move it.
    pub cash_asset: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        BrokerConfig {
            cash_asset: DEFAULT_CASH_ASSET.to_string(),
        }
    }
}

impl BrokerConfig {
    pub fn with_cash_asset(cash_asset: impl Into<String>) -> Self {
        BrokerConfig {
            cash_asset: cash_asset.into(),
        }
    }
}
