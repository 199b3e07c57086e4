//! Configuration for the brokerage TCP server.
//!
//! Use the defaults or override via environment variables:
//!
//! - `BROKER_BIND_ADDR`      (default: "0.0.0.0")
//! - `BROKER_PORT`           (default: "9000")
//! - `BROKER_MAX_CLIENTS`    (default: "1024")
//! - `BROKER_CASH_ASSET`     (default: "TRY")
//! - `BROKER_ADMIN_USER`     (default: "admin")
//! - `BROKER_ADMIN_PASSWORD` (default: "admin")

use std::env;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use broker_core::config::DEFAULT_CASH_ASSET;
use broker_core::BrokerConfig;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// IP address / interface to bind to (e.g. "0.0.0.0" or "127.0.0.1").
    pub bind_addr: String,

    /// TCP port to listen on.
    pub port: u16,

    /// Maximum number of simultaneously connected clients.
    pub max_clients: usize,

    /// Asset name that plays the role of cash.
    pub cash_asset: String,

    /// ADMIN account registered at startup.
    pub admin_user: String,
    pub admin_password: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: "0.0.0.0".to_string(),
            port: 9000,
            max_clients: 1024,
            cash_asset: DEFAULT_CASH_ASSET.to_string(),
            admin_user: "admin".to_string(),
            admin_password: "admin".to_string(),
        }
    }
}

impl Config {
    /// Construct a `Config` from environment variables, falling back
    /// to the defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Config::default();

        let config = Config {
            bind_addr: env::var("BROKER_BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: read_env_or_default("BROKER_PORT", defaults.port)?,
            max_clients: read_env_or_default("BROKER_MAX_CLIENTS", defaults.max_clients)?,
            cash_asset: env::var("BROKER_CASH_ASSET").unwrap_or(defaults.cash_asset),
            admin_user: env::var("BROKER_ADMIN_USER").unwrap_or(defaults.admin_user),
            admin_password: env::var("BROKER_ADMIN_PASSWORD").unwrap_or(defaults.admin_password),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.cash_asset.trim().is_empty() {
            bail!("BROKER_CASH_ASSET must not be blank");
        }
        if self.admin_user.trim().is_empty() {
            bail!("BROKER_ADMIN_USER must not be blank");
        }
        if self.max_clients == 0 {
            bail!("BROKER_MAX_CLIENTS must be at least 1");
        }
        Ok(())
    }

    /// Convenience: `addr:port` socket string.
    pub fn socket_addr_string(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    pub fn broker_config(&self) -> BrokerConfig {
        BrokerConfig::with_cash_asset(self.cash_asset.trim())
    }
}

fn read_env_or_default<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .with_context(|| format!("invalid value for {}: {:?}", key, val)),
        Err(_) => Ok(default),
    }
}
