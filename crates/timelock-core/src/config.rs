//! Run configuration
//!
//! Loaded from a TOML file, then overridden from the environment:
//!
//! ```toml
//! rpc_url = "http://127.0.0.1:8545"
//! timelock = "0x..."
//! sender = "0x..."
//! ledger_dir = "ledger"
//!
//! [gas]
//! headroom_percent = 20
//! fixed_buffer = 0
//!
//! [addresses]
//! FeeController = "0x..."
//! ```

use crate::address_book::AddressBook;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use timelock_abi::{parse_address, Address};

/// Environment variable overriding `rpc_url`
pub const ENV_RPC_URL: &str = "TIMELOCK_RPC_URL";
/// Environment variable overriding `timelock`
pub const ENV_TIMELOCK_ADDRESS: &str = "TIMELOCK_ADDRESS";
/// Environment variable overriding `sender`
pub const ENV_SENDER: &str = "TIMELOCK_SENDER";
/// Environment variable overriding `ledger_dir`
pub const ENV_LEDGER_DIR: &str = "TIMELOCK_LEDGER_DIR";

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelockConfig {
    /// JSON-RPC endpoint
    pub rpc_url: String,
    /// Delay contract address
    pub timelock: Option<String>,
    /// Unlocked node account that signs submissions
    pub sender: Option<String>,
    /// Directory holding batch files
    pub ledger_dir: PathBuf,
    /// Gas headroom applied to estimates
    pub gas: GasPolicy,
    /// Whether submissions carry explicit sequence numbers
    pub use_sequence_numbers: bool,
    /// How long to wait for a receipt
    pub confirmation_timeout_secs: u64,
    /// Receipt polling interval
    pub poll_interval_ms: u64,
    /// Logical target names
    pub addresses: BTreeMap<String, String>,
}

impl Default for TimelockConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            timelock: None,
            sender: None,
            ledger_dir: PathBuf::from("ledger"),
            gas: GasPolicy::default(),
            use_sequence_numbers: true,
            confirmation_timeout_secs: 300,
            poll_interval_ms: 1_000,
            addresses: BTreeMap::new(),
        }
    }
}

impl TimelockConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// Returns [`ConfigError::Parse`] on malformed TOML or unknown value types
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::parse_error("<inline>", e))
    }

    /// Load a TOML file
    ///
    /// # Errors
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`]
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::io_error(path, e))?;
        toml::from_str(&text).map_err(|e| ConfigError::parse_error(path, e))
    }

    /// Apply `TIMELOCK_*` overrides from the process environment
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply `TIMELOCK_*` overrides from an arbitrary lookup
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = var(ENV_RPC_URL) {
            self.rpc_url = url;
        }
        if let Some(address) = var(ENV_TIMELOCK_ADDRESS) {
            self.timelock = Some(address);
        }
        if let Some(address) = var(ENV_SENDER) {
            self.sender = Some(address);
        }
        if let Some(dir) = var(ENV_LEDGER_DIR) {
            self.ledger_dir = PathBuf::from(dir);
        }
        self
    }

    /// With RPC endpoint
    #[inline]
    #[must_use]
    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = url.into();
        self
    }

    /// With delay contract address
    #[inline]
    #[must_use]
    pub fn with_timelock(mut self, address: impl Into<String>) -> Self {
        self.timelock = Some(address.into());
        self
    }

    /// With submitting account
    #[inline]
    #[must_use]
    pub fn with_sender(mut self, address: impl Into<String>) -> Self {
        self.sender = Some(address.into());
        self
    }

    /// With ledger directory
    #[inline]
    #[must_use]
    pub fn with_ledger_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.ledger_dir = dir.into();
        self
    }

    /// With gas policy
    #[inline]
    #[must_use]
    pub fn with_gas(mut self, gas: GasPolicy) -> Self {
        self.gas = gas;
        self
    }

    /// With or without explicit sequence numbers
    #[inline]
    #[must_use]
    pub fn with_sequence_numbers(mut self, enabled: bool) -> Self {
        self.use_sequence_numbers = enabled;
        self
    }

    /// With a logical address entry
    #[must_use]
    pub fn with_address(mut self, name: impl Into<String>, address: impl Into<String>) -> Self {
        self.addresses.insert(name.into(), address.into());
        self
    }

    /// Parsed delay contract address
    ///
    /// # Errors
    /// [`ConfigError::Missing`] or [`ConfigError::InvalidAddress`]
    pub fn timelock_address(&self) -> Result<Address, ConfigError> {
        required_address("timelock", self.timelock.as_deref())
    }

    /// Parsed submitting account
    ///
    /// # Errors
    /// [`ConfigError::Missing`] or [`ConfigError::InvalidAddress`]
    pub fn sender_address(&self) -> Result<Address, ConfigError> {
        required_address("sender", self.sender.as_deref())
    }

    /// Logical-name lookup built from `[addresses]`
    ///
    /// # Errors
    /// [`ConfigError::InvalidAddress`] naming the offending entry
    pub fn address_book(&self) -> Result<AddressBook, ConfigError> {
        AddressBook::from_entries(&self.addresses)
    }

    /// Receipt wait limit
    #[must_use]
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }

    /// Receipt polling interval
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Check settings needed to talk to a node
    ///
    /// # Errors
    /// The first missing or invalid setting
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc_url.trim().is_empty() {
            return Err(ConfigError::Missing("rpc_url"));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "poll_interval_ms",
                reason: "must be positive".to_string(),
            });
        }
        if self.confirmation_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "confirmation_timeout_secs",
                reason: "must be positive".to_string(),
            });
        }
        self.timelock_address()?;
        self.sender_address()?;
        self.address_book()?;
        Ok(())
    }
}

fn required_address(field: &'static str, raw: Option<&str>) -> Result<Address, ConfigError> {
    let raw = raw.ok_or(ConfigError::Missing(field))?;
    parse_address(raw).map_err(|source| ConfigError::InvalidAddress {
        field: field.to_string(),
        source,
    })
}

/// Gas allowance above the node's estimate
///
/// `limit = estimate + estimate * headroom_percent / 100 + fixed_buffer`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasPolicy {
    /// Proportional headroom
    pub headroom_percent: u64,
    /// Flat addition
    pub fixed_buffer: u64,
}

impl Default for GasPolicy {
    fn default() -> Self {
        Self {
            headroom_percent: 20,
            fixed_buffer: 0,
        }
    }
}

impl GasPolicy {
    /// Gas limit to submit with
    #[must_use]
    pub fn apply(&self, estimate: u64) -> u64 {
        let headroom = u128::from(estimate) * u128::from(self.headroom_percent) / 100;
        let limit = u128::from(estimate) + headroom + u128::from(self.fixed_buffer);
        u64::try_from(limit).unwrap_or(u64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TIMELOCK: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
    const SENDER: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";

    #[test]
    fn parses_toml_with_defaults() {
        let config = TimelockConfig::from_toml_str(&format!(
            r#"
            timelock = "{TIMELOCK}"
            sender = "{SENDER}"

            [gas]
            fixed_buffer = 50000

            [addresses]
            FeeController = "{TIMELOCK}"
            "#
        ))
        .unwrap();

        assert_eq!(config.rpc_url, "http://127.0.0.1:8545");
        assert_eq!(config.gas, GasPolicy { headroom_percent: 20, fixed_buffer: 50_000 });
        assert!(config.use_sequence_numbers);
        assert_eq!(config.address_book().unwrap().len(), 1);
        config.validate().unwrap();
    }

    #[test]
    fn environment_overrides_file_values() {
        let config = TimelockConfig::new()
            .with_rpc_url("http://file:8545")
            .with_overrides_from(|key| match key {
                ENV_RPC_URL => Some("http://env:8545".to_string()),
                ENV_LEDGER_DIR => Some("/var/ledger".to_string()),
                ENV_SENDER => Some("   ".to_string()),
                _ => None,
            });

        assert_eq!(config.rpc_url, "http://env:8545");
        assert_eq!(config.ledger_dir, PathBuf::from("/var/ledger"));
        assert_eq!(config.sender, None);
    }

    #[test]
    fn validation_names_missing_settings() {
        let err = TimelockConfig::new().with_sender(SENDER).validate().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("timelock")));

        let err = TimelockConfig::new()
            .with_timelock(TIMELOCK)
            .with_sender("0xabc")
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidAddress { ref field, .. } if field == "sender"));
    }

    #[test]
    fn gas_policy_adds_headroom() {
        let policy = GasPolicy { headroom_percent: 25, fixed_buffer: 1_000 };
        assert_eq!(policy.apply(100_000), 126_000);
        assert_eq!(GasPolicy { headroom_percent: 100, fixed_buffer: u64::MAX }.apply(u64::MAX), u64::MAX);
    }

    #[test]
    fn demo_configuration_is_complete() {
        let config = TimelockConfig::from_toml_str(include_str!("../../../demos/timelock.toml")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.address_book().unwrap().len(), 2);
        assert_eq!(config.gas, GasPolicy::default());
    }
}
