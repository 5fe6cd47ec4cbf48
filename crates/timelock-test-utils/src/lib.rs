//! Testing utilities for the timelock workspace
//!
//! Shared fixtures and an in-memory delay contract.

#![allow(missing_docs)]

pub mod simulator;

pub use simulator::{reasons, SimulatedTimelock, SubmissionRecord};

use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use timelock_abi::{parse_address, Address};
use timelock_core::{AddressBook, ExecutePhase, OperationRequest, QueuePhase};
use timelock_ledger::Ledger;

/// Checksummed address standing in for the fee contract
pub const FEE_CONTRACT: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

/// Checksummed address standing in for a treasury
pub const TREASURY: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";

/// Delay used by the fixtures, one day
pub const TIMELOCK_DELAY: u64 = 86_400;

/// Clock start for simulated chains
pub const GENESIS_TIME: u64 = 1_700_000_000;

pub fn fee_contract() -> Address {
    parse_address(FEE_CONTRACT).unwrap()
}

pub fn treasury() -> Address {
    parse_address(TREASURY).unwrap()
}

/// Book with `FeeController` and `Treasury`
pub fn address_book() -> AddressBook {
    AddressBook::new()
        .with_entry("FeeController", fee_contract())
        .with_entry("Treasury", treasury())
}

/// `setFee(uint256)` on the fee contract, maturing one delay from queue time
pub fn set_fee_request(fee: u64) -> OperationRequest {
    OperationRequest::new(format!("set fee to {fee}bps"), "FeeController", "setFee(uint256)")
        .with_param("uint256", json!(fee))
        .with_delay(TIMELOCK_DELAY)
}

/// `setName(string)` with an arbitrary string parameter
pub fn set_name_request(name: &str) -> OperationRequest {
    OperationRequest::new(format!("rename to {name}"), "FeeController", "setName(string)")
        .with_param("string", json!(name))
        .with_delay(TIMELOCK_DELAY)
}

/// Simulated chain plus a ledger in a temporary directory
pub struct Harness {
    pub dir: TempDir,
    pub ledger: Arc<Ledger>,
    pub chain: Arc<SimulatedTimelock>,
}

impl Harness {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(Ledger::open(dir.path()).await.unwrap());
        let chain = Arc::new(SimulatedTimelock::new(GENESIS_TIME, TIMELOCK_DELAY));
        Self { dir, ledger, chain }
    }

    pub fn queue_phase(&self) -> QueuePhase {
        QueuePhase::new(self.chain.clone(), self.ledger.clone(), address_book())
    }

    pub fn execute_phase(&self) -> ExecutePhase {
        ExecutePhase::new(self.chain.clone(), self.ledger.clone())
    }
}
