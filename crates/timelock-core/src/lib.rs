//! Timelock Core - deferred governance transaction orchestration
//!
//! Two-phase protocol against an on-chain delay contract:
//! - [`QueuePhase`]: encode each requested call, queue it with an explicit
//!   sequence number, record it in a new ledger batch together with a replay
//!   command
//! - [`ExecutePhase`]: read a batch back, verify each entry still encodes to
//!   the recorded bytes, execute it and record the receipt in a result batch
//!
//! The contract is reached through the [`DelayContract`] trait, implemented
//! over JSON-RPC by [`JsonRpcDelayContract`]. Phases receive the client at
//! construction; nothing here keeps a global connection.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use timelock_core::{ExecutePhase, JsonRpcDelayContract, QueuePhase, QueuePlan, TimelockConfig};
//! use timelock_ledger::Ledger;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TimelockConfig::from_path("timelock.toml")?.with_env_overrides();
//! let contract = Arc::new(JsonRpcDelayContract::from_config(&config)?);
//! let ledger = Arc::new(Ledger::open(&config.ledger_dir).await?);
//!
//! let plan = QueuePlan::from_path("fees.yaml").await?;
//! let report = QueuePhase::new(contract.clone(), ledger.clone(), config.address_book()?)
//!     .run("fees", &plan)
//!     .await?;
//!
//! if let Some(batch) = report.batch {
//!     // later, once the delay has passed
//!     ExecutePhase::new(contract, ledger).run(&batch).await?;
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod address_book;
pub mod config;
pub mod contract;
pub mod error;
pub mod execute;
pub mod plan;
pub mod queue;
pub mod replay;
pub mod report;
pub mod rpc;
pub mod sequence;
mod submit;

pub use address_book::AddressBook;
pub use config::{GasPolicy, TimelockConfig};
pub use contract::{CallKind, DelayContract, Receipt, SubmitOptions, TimelockCall};
pub use error::{ConfigError, SubmissionError, TimelockError};
pub use execute::{ExecutePhase, EXECUTED_SUFFIX};
pub use plan::{OperationRequest, QueuePlan};
pub use queue::{FailurePolicy, QueuePhase};
pub use report::{ExecuteReport, OperationFailure, QueueReport, Stage};
pub use rpc::JsonRpcDelayContract;
pub use sequence::SequenceAllocator;
