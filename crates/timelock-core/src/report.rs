//! Run reports
//!
//! Every per-operation failure is kept with the stage it happened in, so a run
//! never drops an error silently and the exit status can reflect it.

use crate::error::TimelockError;
use std::fmt::{self, Display, Formatter};
use timelock_ledger::{BatchName, ProposedOperation};

/// Where in its lifecycle an operation failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Resolving, encoding or pre-flight checks; nothing was sent
    Building,
    /// Estimation or submission to the delay contract
    Submitting,
    /// Writing the ledger entry after a successful submission
    Recording,
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Building => f.write_str("building"),
            Self::Submitting => f.write_str("submitting"),
            Self::Recording => f.write_str("recording"),
        }
    }
}

/// One operation that did not make it into the output batch
#[derive(Debug)]
pub struct OperationFailure {
    /// Position in the plan or source batch
    pub index: usize,
    /// Operation description
    pub description: String,
    /// Stage that failed
    pub stage: Stage,
    /// Cause
    pub error: TimelockError,
}

impl Display for OperationFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} '{}' failed while {}: {}",
            self.index, self.description, self.stage, self.error
        )
    }
}

/// Outcome of a queue run
#[derive(Debug)]
pub struct QueueReport {
    /// Batch the run wrote to; `None` when nothing reached submission
    pub batch: Option<BatchName>,
    /// Entries appended, in plan order
    pub recorded: Vec<ProposedOperation>,
    /// Operations that were not recorded
    pub failures: Vec<OperationFailure>,
    /// Operations never attempted because the run stopped early
    pub skipped: usize,
}

impl QueueReport {
    /// Whether every operation was recorded
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.skipped == 0
    }
}

/// Outcome of an execute run
#[derive(Debug)]
pub struct ExecuteReport {
    /// Batch that was read
    pub source: BatchName,
    /// Batch the results were written to
    pub output: BatchName,
    /// Entries executed by this run
    pub executed: Vec<ProposedOperation>,
    /// Entries already executed before this run, copied through unchanged
    pub carried_over: usize,
    /// Entries left pending
    pub failures: Vec<OperationFailure>,
    /// Entries never attempted because the run stopped early
    pub skipped: usize,
}

impl ExecuteReport {
    /// Whether every source entry ended up executed
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.skipped == 0
    }
}
