//! Timelock Ledger - durable record of proposed operations
//!
//! Stores every operation accepted by the delay contract so a later run,
//! possibly on another machine, can execute it after review:
//! - [`ProposedOperation`]: one entry, immutable apart from its execute receipt
//! - [`BatchName`]: `{unixTimestamp}_{label}` naming with total order
//! - [`Ledger`]: directory of batch files with append and read
//!
//! Batches are inputs once written. Execution results go to a new batch so the
//! queue batch and the result batch together form the audit trail; [`pending`]
//! diffs the two.

#![warn(unreachable_pub)]

pub mod batch;
pub mod error;
pub mod operation;
pub mod store;

pub use batch::{BatchName, BATCH_EXTENSION};
pub use error::LedgerError;
pub use operation::{
    pending, OperationDraft, OperationKey, OperationState, ProposedOperation, QueueEvidence,
};
pub use store::Ledger;
