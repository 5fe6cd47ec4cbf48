//! Batch naming
//!
//! A batch is persisted as `{unixTimestamp}_{label}.json`. The timestamp prefix
//! gives batches a total order by creation time and keeps two runs with the
//! same label from writing to the same file.

use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// File extension of batch files
pub const BATCH_EXTENSION: &str = "json";

/// Name of one persisted batch
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BatchName {
    created_at: i64,
    label: String,
}

impl BatchName {
    /// Create a batch name from a capture timestamp and a label
    ///
    /// # Errors
    /// Returns [`LedgerError::InvalidBatchName`] when the label is empty or
    /// contains characters outside `[A-Za-z0-9._-]`
    pub fn new(created_at: i64, label: impl Into<String>) -> Result<Self, LedgerError> {
        let label = label.into();
        if !is_valid_label(&label) || created_at < 0 {
            return Err(LedgerError::InvalidBatchName(label));
        }
        Ok(Self { created_at, label })
    }

    /// Batch name stamped with the current time
    ///
    /// # Errors
    /// See [`BatchName::new`]
    pub fn now(label: impl Into<String>) -> Result<Self, LedgerError> {
        Self::new(Utc::now().timestamp(), label)
    }

    /// Unix timestamp (seconds) of creation
    #[inline]
    #[must_use]
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// Creation time as a UTC datetime
    #[must_use]
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created_at, 0)
    }

    /// Human-assigned label
    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// File name inside the ledger directory
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("{self}.{BATCH_EXTENSION}")
    }
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty()
        && label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}

impl Display for BatchName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.created_at, self.label)
    }
}

impl FromStr for BatchName {
    type Err = LedgerError;

    /// Parse `{unixTimestamp}_{label}`, with or without the `.json` extension
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LedgerError::InvalidBatchName(s.to_string());
        let stem = s
            .strip_suffix(&format!(".{BATCH_EXTENSION}"))
            .unwrap_or(s);
        let (timestamp, label) = stem.split_once('_').ok_or_else(invalid)?;
        if timestamp.is_empty() || !timestamp.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let created_at = timestamp.parse().map_err(|_| invalid())?;
        Self::new(created_at, label)
    }
}
