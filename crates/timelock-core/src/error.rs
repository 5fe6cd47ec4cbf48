//! Error types for timelock orchestration
//!
//! Provides error handling for:
//! - Delay-contract submissions (reverts, transport and RPC failures)
//! - Configuration loading and validation
//! - Plan resolution before anything is submitted
//! - Ledger and encoding failures bubbling up from the lower crates

use crate::contract::CallKind;
use std::path::PathBuf;
use timelock_abi::EncodingError;
use timelock_ledger::LedgerError;

/// Main orchestration error type
#[derive(Debug, thiserror::Error)]
pub enum TimelockError {
    /// Parameters do not encode as their declared types
    #[error("encoding failed: {0}")]
    Encoding(#[from] EncodingError),

    /// Ledger read or write failed
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Delay contract rejected the call or could not be reached
    #[error("submission failed: {0}")]
    Submission(#[from] SubmissionError),

    /// Configuration is missing or invalid
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Target is neither an address nor a known logical name
    #[error("unknown target '{0}'")]
    UnknownTarget(String),

    /// Maturity must lie strictly after the current chain timestamp
    #[error("maturity time {maturity_time} is not after chain time {chain_time}")]
    MaturityNotInFuture {
        /// Requested maturity
        maturity_time: u64,
        /// Latest block timestamp at queue time
        chain_time: u64,
    },

    /// Re-encoding a recorded entry did not reproduce its stored data
    #[error("re-encoded data for '{description}' differs from recorded data ({recorded} != {reencoded})")]
    DataMismatch {
        /// Operation description
        description: String,
        /// `0x` hex stored in the ledger
        recorded: String,
        /// `0x` hex produced now
        reencoded: String,
    },

    /// Operation request is malformed
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
}

impl TimelockError {
    /// Check if re-running the phase could succeed without changing inputs
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Submission(e) => e.is_retryable(),
            Self::Ledger(LedgerError::Io { .. }) => true,
            _ => false,
        }
    }
}

/// Failure reported by the delay contract or the transport underneath it
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    /// The contract reverted; `reason` is passed through uninterpreted
    #[error("{kind} reverted: {reason}")]
    Reverted {
        /// Entry point that reverted
        kind: CallKind,
        /// Revert reason as reported by the node
        reason: String,
    },

    /// Node could not be reached or the connection failed mid-request
    #[error("transport error: {0}")]
    Transport(String),

    /// Node answered with a JSON-RPC error that is not a revert
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code
        code: i64,
        /// Error message
        message: String,
    },

    /// Transaction was sent but no receipt appeared in time
    #[error("transaction {tx_hash} not confirmed after {waited_secs}s")]
    ConfirmationTimeout {
        /// Hash of the sent transaction
        tx_hash: String,
        /// Seconds spent polling
        waited_secs: u64,
    },

    /// Node answered with something that does not parse
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl SubmissionError {
    /// Create revert error
    #[inline]
    pub fn reverted(kind: CallKind, reason: impl Into<String>) -> Self {
        Self::Reverted {
            kind,
            reason: reason.into(),
        }
    }

    /// Revert reason, if the contract reverted
    #[must_use]
    pub fn revert_reason(&self) -> Option<&str> {
        match self {
            Self::Reverted { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Check if error is retryable
    ///
    /// Reverts count as retryable: a premature execute reverts until the
    /// maturity time passes, and the contract is the only judge of that.
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidResponse(_))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required setting absent from file and environment
    #[error("missing setting '{0}'")]
    Missing(&'static str),

    /// Address setting does not parse
    #[error("invalid address for '{field}': {source}")]
    InvalidAddress {
        /// Setting or address-book entry
        field: String,
        /// Parse failure
        #[source]
        source: EncodingError,
    },

    /// Setting present but out of range
    #[error("invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Setting name
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },

    /// Config or plan file could not be read
    #[error("io error on {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File content does not parse
    #[error("cannot parse {path}: {reason}")]
    Parse {
        /// File involved
        path: PathBuf,
        /// Parser message
        reason: String,
    },
}

impl ConfigError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create parse error for path
    pub fn parse_error(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Parse {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revert_reason_is_preserved_verbatim() {
        let reason = "Timelock::executeTransaction: Transaction hasn't surpassed time lock.";
        let err = SubmissionError::reverted(CallKind::Execute, reason);
        assert_eq!(err.revert_reason(), Some(reason));
        assert!(err.to_string().contains(reason));
    }

    #[test]
    fn classifies_retryable_errors() {
        let revert: TimelockError = SubmissionError::reverted(CallKind::Execute, "too early").into();
        assert!(revert.is_retryable());

        let garbled: TimelockError = SubmissionError::InvalidResponse("null".into()).into();
        assert!(!garbled.is_retryable());

        let unknown = TimelockError::UnknownTarget("FeeController".into());
        assert!(!unknown.is_retryable());
    }
}
