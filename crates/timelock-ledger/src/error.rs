//! Error types for the transaction ledger

use crate::batch::BatchName;
use std::path::PathBuf;
use timelock_abi::EncodingError;

/// Errors raised by ledger reads, writes and record validation
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Filesystem failure
    #[error("io error on {path}: {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Batch file is not valid JSON or not a list of records
    #[error("malformed batch file {path}: {source}")]
    Serialization {
        /// Offending file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// Batch label or file name does not follow `{unixTimestamp}_{label}`
    #[error("invalid batch name '{0}'")]
    InvalidBatchName(String),

    /// Refusing to overwrite an existing batch
    #[error("batch {0} already exists")]
    BatchExists(BatchName),

    /// No batch with that name or label
    #[error("batch '{0}' not found")]
    BatchNotFound(String),

    /// A record field could not be interpreted
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Record parameters do not encode
    #[error("record does not encode: {0}")]
    Encoding(#[from] EncodingError),

    /// Queuing evidence is incomplete
    #[error("operation '{0}' has no queue receipt")]
    MissingQueueReceipt(String),

    /// Execution receipts are write-once
    #[error("operation '{description}' already executed in {receipt}")]
    AlreadyExecuted {
        /// Operation description
        description: String,
        /// Existing execute receipt
        receipt: String,
    },
}

impl LedgerError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
