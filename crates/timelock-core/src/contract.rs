//! Delay-contract client interface
//!
//! The orchestrator is a pure client of a Compound-style timelock. Both entry
//! points take the same tuple:
//!
//! `queueTransaction(address target, uint256 value, string signature, bytes data, uint256 eta)`
//! `executeTransaction(address target, uint256 value, string signature, bytes data, uint256 eta)`
//!
//! where `data` is the ABI encoding of the parameters without a selector and
//! the contract hashes the tuple to identify the queued transaction.

use crate::error::SubmissionError;
use alloy_primitives::{keccak256, Bytes, B256};
use alloy_sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use timelock_abi::{Address, EncodingError, U256};
use timelock_ledger::{OperationDraft, ProposedOperation};

#[allow(unreachable_pub, clippy::pedantic)]
mod entry_points {
    alloy_sol_types::sol! {
        function queueTransaction(address target, uint256 value, string signature, bytes data, uint256 eta) returns (bytes32);
        function executeTransaction(address target, uint256 value, string signature, bytes data, uint256 eta) payable returns (bytes);
    }
}

/// Which timelock entry point a submission targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallKind {
    /// `queueTransaction`
    Queue,
    /// `executeTransaction`
    Execute,
}

impl CallKind {
    /// Full signature of the entry point
    #[must_use]
    pub fn signature(self) -> &'static str {
        match self {
            Self::Queue => entry_points::queueTransactionCall::SIGNATURE,
            Self::Execute => entry_points::executeTransactionCall::SIGNATURE,
        }
    }
}

impl Display for CallKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queue => f.write_str("queueTransaction"),
            Self::Execute => f.write_str("executeTransaction"),
        }
    }
}

/// The `(target, value, signature, data, eta)` tuple both entry points take
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimelockCall {
    /// Contract the timelock will call
    pub target: Address,
    /// Native currency forwarded with the call
    pub value: U256,
    /// Canonical signature of the target function
    pub signature: String,
    /// Encoded parameters (no selector)
    pub data: Vec<u8>,
    /// Maturity time
    pub eta: u64,
}

impl TimelockCall {
    /// Tuple for a draft about to be queued
    ///
    /// # Errors
    /// Returns [`EncodingError`] if the draft's call does not encode
    pub fn from_draft(draft: &OperationDraft) -> Result<Self, EncodingError> {
        Ok(Self {
            target: draft.target,
            value: draft.value,
            signature: draft.call.signature().canonical(),
            data: draft.call.encode()?,
            eta: draft.maturity_time,
        })
    }

    /// Tuple for a recorded entry, using the data stored at queue time
    #[must_use]
    pub fn from_recorded(op: &ProposedOperation) -> Self {
        Self {
            target: op.target(),
            value: op.value(),
            signature: op.call().signature().canonical(),
            data: op.data().to_vec(),
            eta: op.maturity_time(),
        }
    }

    /// Transaction input for the given entry point
    #[must_use]
    pub fn calldata(&self, kind: CallKind) -> Vec<u8> {
        let data = Bytes::copy_from_slice(&self.data);
        let eta = U256::from(self.eta);
        match kind {
            CallKind::Queue => entry_points::queueTransactionCall {
                target: self.target,
                value: self.value,
                signature: self.signature.clone(),
                data,
                eta,
            }
            .abi_encode(),
            CallKind::Execute => entry_points::executeTransactionCall {
                target: self.target,
                value: self.value,
                signature: self.signature.clone(),
                data,
                eta,
            }
            .abi_encode(),
        }
    }

    /// Identifier under which the timelock tracks this transaction
    ///
    /// `keccak256(abi.encode(target, value, signature, data, eta))`
    #[must_use]
    pub fn hash(&self) -> B256 {
        let tuple = (
            self.target,
            self.value,
            self.signature.clone(),
            Bytes::copy_from_slice(&self.data),
            U256::from(self.eta),
        );
        keccak256(tuple.abi_encode_params())
    }

    /// Native currency attached to the transaction for `kind`
    ///
    /// Only execution forwards value to the target.
    #[must_use]
    pub fn attached_value(&self, kind: CallKind) -> U256 {
        match kind {
            CallKind::Queue => U256::ZERO,
            CallKind::Execute => self.value,
        }
    }
}

/// Per-submission transaction settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    /// Explicit account nonce
    pub nonce: Option<u64>,
    /// Gas limit, already including headroom
    pub gas_limit: Option<u64>,
}

/// Confirmation of a mined transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Transaction hash (`0x` hex)
    pub tx_hash: String,
    /// Block that included it
    pub block_number: Option<u64>,
    /// Gas actually consumed
    pub gas_used: Option<u64>,
}

/// Client of an on-chain delay contract
///
/// Implementations own the connection and signer; the phases receive one at
/// construction and never hold ambient connection state of their own.
#[async_trait]
pub trait DelayContract: Send + Sync {
    /// Timestamp of the latest block
    async fn latest_timestamp(&self) -> Result<u64, SubmissionError>;

    /// Transaction count of the submitting account, including pending ones
    async fn transaction_count(&self) -> Result<u64, SubmissionError>;

    /// Gas the call would use; reverts surface here before anything is sent
    async fn estimate(&self, kind: CallKind, call: &TimelockCall) -> Result<u64, SubmissionError>;

    /// Send the call and wait for it to be mined
    async fn submit(
        &self,
        kind: CallKind,
        call: &TimelockCall,
        options: SubmitOptions,
    ) -> Result<Receipt, SubmissionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use timelock_abi::parse_address;

    fn set_fee() -> TimelockCall {
        TimelockCall {
            target: parse_address("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").unwrap(),
            value: U256::ZERO,
            signature: "setFee(uint256)".to_string(),
            data: timelock_abi::encode("setFee(uint256)", &["uint256"], vec![150u64.into()]).unwrap(),
            eta: 1_700_086_400,
        }
    }

    #[test]
    fn calldata_uses_entry_point_selector() {
        let call = set_fee();
        let queue = call.calldata(CallKind::Queue);
        let execute = call.calldata(CallKind::Execute);

        assert_eq!(hex::encode(&queue[..4]), "3a66f901");
        assert_eq!(hex::encode(&execute[..4]), "0825f38f");
        assert_eq!(queue[4..], execute[4..]);
    }

    #[test]
    fn hash_depends_on_every_field() {
        let base = set_fee();
        let mut later = base.clone();
        later.eta += 1;
        assert_ne!(base.hash(), later.hash());
        assert_eq!(base.hash(), set_fee().hash());
    }

    #[test]
    fn entry_point_tuple_matches_dynamic_encoding() {
        let call = set_fee();
        let types = ["address", "uint256", "string", "bytes", "uint256"];
        let values = vec![
            timelock_abi::AbiValue::Address(call.target),
            timelock_abi::AbiValue::Uint(call.value),
            timelock_abi::AbiValue::String(call.signature.clone()),
            timelock_abi::AbiValue::Bytes(call.data.clone()),
            timelock_abi::AbiValue::uint(call.eta),
        ];
        let dynamic = timelock_abi::Call::new(CallKind::Execute.signature(), &types, values).unwrap();

        assert_eq!(call.calldata(CallKind::Execute), dynamic.calldata().unwrap());
        assert_eq!(call.hash(), keccak256(dynamic.encode().unwrap()));
    }

    #[test]
    fn only_execute_attaches_value() {
        let mut call = set_fee();
        call.value = U256::from(5u64);
        assert_eq!(call.attached_value(CallKind::Queue), U256::ZERO);
        assert_eq!(call.attached_value(CallKind::Execute), U256::from(5u64));
    }
}
