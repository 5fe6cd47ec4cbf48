//! Logical-name address lookup
//!
//! Chain-specific addresses come from configuration. Operations may name a
//! target either by literal address or by a logical name such as
//! `FeeController`; the book resolves the latter and never invents addresses.

use crate::error::{ConfigError, TimelockError};
use std::collections::BTreeMap;
use timelock_abi::{parse_address, Address};

/// Read-only `name -> address` table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressBook {
    entries: BTreeMap<String, Address>,
}

impl AddressBook {
    /// Empty book; only literal addresses resolve
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw `name = "0x..."` pairs
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidAddress`] naming the first bad entry
    pub fn from_entries<'a>(
        entries: impl IntoIterator<Item = (&'a String, &'a String)>,
    ) -> Result<Self, ConfigError> {
        let entries = entries
            .into_iter()
            .map(|(name, raw)| {
                parse_address(raw)
                    .map(|address| (name.clone(), address))
                    .map_err(|source| ConfigError::InvalidAddress {
                        field: format!("addresses.{name}"),
                        source,
                    })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { entries })
    }

    /// Add or replace one entry
    #[must_use]
    pub fn with_entry(mut self, name: impl Into<String>, address: Address) -> Self {
        self.entries.insert(name.into(), address);
        self
    }

    /// Address registered under `name`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Address> {
        self.entries.get(name).copied()
    }

    /// Resolve a literal `0x` address or a logical name
    ///
    /// # Errors
    /// - [`TimelockError::Encoding`] if a literal address is malformed
    /// - [`TimelockError::UnknownTarget`] if the name is not registered
    pub fn resolve(&self, name_or_address: &str) -> Result<Address, TimelockError> {
        let trimmed = name_or_address.trim();
        if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
            return Ok(parse_address(trimmed)?);
        }
        self.get(trimmed)
            .ok_or_else(|| TimelockError::UnknownTarget(trimmed.to_string()))
    }

    /// Registered names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the book is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
