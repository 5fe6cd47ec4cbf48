//! Ledger entries
//!
//! A [`ProposedOperation`] is written once, after the queue submission
//! succeeded, and afterwards only ever gains an execute receipt. Its lifecycle
//! is derived from the receipts:
//! - `Queued`: has a queue receipt, no execute receipt
//! - `Executed`: has both
//!
//! On disk each entry is a flat JSON object with camelCase fields; loading
//! re-validates the call so a hand-edited batch cannot smuggle in parameters
//! that do not match their types.

use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use timelock_abi::{parse_address, Address, Call, U256};

/// Lifecycle state of a recorded operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationState {
    /// Accepted by the delay contract, awaiting execution
    Queued,
    /// Executed after maturity
    Executed,
}

impl Display for OperationState {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => f.write_str("queued"),
            Self::Executed => f.write_str("executed"),
        }
    }
}

/// An operation that has not been submitted yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDraft {
    /// Free-text description, informational only
    pub description: String,
    /// Contract the delay contract will call
    pub target: Address,
    /// Native currency attached to the call
    pub value: U256,
    /// Validated call
    pub call: Call,
    /// Earliest execution timestamp (seconds)
    pub maturity_time: u64,
}

/// Evidence produced by a successful queue submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEvidence {
    /// Encoded call as submitted
    pub data: Vec<u8>,
    /// Sequence number the submission used, if any
    pub sequence_number: Option<u64>,
    /// Transaction identifier of the queue submission
    pub queue_receipt: String,
    /// Rendered replay command
    pub replay_command: String,
}

impl OperationDraft {
    /// Turn the draft into a ledger entry
    ///
    /// # Errors
    /// Returns [`LedgerError::MissingQueueReceipt`] when the receipt is empty
    pub fn record(self, evidence: QueueEvidence) -> Result<ProposedOperation, LedgerError> {
        if evidence.queue_receipt.trim().is_empty() {
            return Err(LedgerError::MissingQueueReceipt(self.description));
        }
        Ok(ProposedOperation {
            description: self.description,
            target: self.target,
            value: self.value,
            call: self.call,
            data: evidence.data,
            maturity_time: self.maturity_time,
            sequence_number: evidence.sequence_number,
            queue_receipt: evidence.queue_receipt,
            execute_receipt: None,
            replay_command: evidence.replay_command,
        })
    }
}

/// One ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "OperationRecord", into = "OperationRecord")]
pub struct ProposedOperation {
    description: String,
    target: Address,
    value: U256,
    call: Call,
    data: Vec<u8>,
    maturity_time: u64,
    sequence_number: Option<u64>,
    queue_receipt: String,
    execute_receipt: Option<String>,
    replay_command: String,
}

/// Identity of an operation as seen by the delay contract
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationKey {
    target: Address,
    value: U256,
    signature: String,
    data: Vec<u8>,
    maturity_time: u64,
}

impl ProposedOperation {
    /// Free-text description
    #[inline]
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Target contract
    #[inline]
    #[must_use]
    pub fn target(&self) -> Address {
        self.target
    }

    /// Attached native currency amount
    #[inline]
    #[must_use]
    pub fn value(&self) -> U256 {
        self.value
    }

    /// Validated call (signature, types, params)
    #[inline]
    #[must_use]
    pub fn call(&self) -> &Call {
        &self.call
    }

    /// Encoded call recorded at queue time
    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Earliest execution timestamp
    #[inline]
    #[must_use]
    pub fn maturity_time(&self) -> u64 {
        self.maturity_time
    }

    /// Sequence number used for the queue submission
    #[inline]
    #[must_use]
    pub fn sequence_number(&self) -> Option<u64> {
        self.sequence_number
    }

    /// Queue transaction identifier
    #[inline]
    #[must_use]
    pub fn queue_receipt(&self) -> &str {
        &self.queue_receipt
    }

    /// Execute transaction identifier, once executed
    #[inline]
    #[must_use]
    pub fn execute_receipt(&self) -> Option<&str> {
        self.execute_receipt.as_deref()
    }

    /// Replay command rendered at queue time
    #[inline]
    #[must_use]
    pub fn replay_command(&self) -> &str {
        &self.replay_command
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> OperationState {
        if self.execute_receipt.is_some() {
            OperationState::Executed
        } else {
            OperationState::Queued
        }
    }

    /// Identity used to match queued entries against execution results
    #[must_use]
    pub fn key(&self) -> OperationKey {
        OperationKey {
            target: self.target,
            value: self.value,
            signature: self.call.signature().canonical(),
            data: self.data.clone(),
            maturity_time: self.maturity_time,
        }
    }

    /// Record the execute receipt
    ///
    /// # Errors
    /// Returns [`LedgerError::AlreadyExecuted`] if a receipt is already set;
    /// receipts are never replaced or cleared
    pub fn mark_executed(&mut self, receipt: impl Into<String>) -> Result<(), LedgerError> {
        if let Some(existing) = &self.execute_receipt {
            return Err(LedgerError::AlreadyExecuted {
                description: self.description.clone(),
                receipt: existing.clone(),
            });
        }
        let receipt = receipt.into();
        if receipt.trim().is_empty() {
            return Err(LedgerError::InvalidRecord(format!(
                "empty execute receipt for '{}'",
                self.description
            )));
        }
        self.execute_receipt = Some(receipt);
        Ok(())
    }
}

/// Entries of `queued` with no executed counterpart in `executed`
///
/// Matching is by count: each executed entry accounts for one queued entry
/// with the same [`OperationKey`], so identical operations queued twice and
/// executed once leave one pending.
#[must_use]
pub fn pending(queued: &[ProposedOperation], executed: &[ProposedOperation]) -> Vec<ProposedOperation> {
    let mut done: HashMap<OperationKey, usize> = HashMap::new();
    for op in executed.iter().filter(|op| op.state() == OperationState::Executed) {
        *done.entry(op.key()).or_default() += 1;
    }

    let mut remaining = Vec::new();
    for op in queued {
        if let Some(count) = done.get_mut(&op.key()).filter(|count| **count > 0) {
            *count -= 1;
            continue;
        }
        if op.state() == OperationState::Queued {
            remaining.push(op.clone());
        }
    }
    remaining
}

/// On-disk shape of a ledger entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OperationRecord {
    description: String,
    target: String,
    value: String,
    signature: String,
    param_types: Vec<String>,
    params: Vec<Value>,
    data: String,
    maturity_time: u64,
    #[serde(default)]
    sequence_number: Option<u64>,
    queue_receipt: String,
    #[serde(default)]
    execute_receipt: String,
    replay_command: String,
}

impl From<ProposedOperation> for OperationRecord {
    fn from(op: ProposedOperation) -> Self {
        Self {
            target: op.target.to_checksum(None),
            value: op.value.to_string(),
            signature: op.call.signature().canonical(),
            param_types: op.call.param_type_names(),
            params: op.call.params_json(),
            data: format!("0x{}", hex::encode(&op.data)),
            description: op.description,
            maturity_time: op.maturity_time,
            sequence_number: op.sequence_number,
            queue_receipt: op.queue_receipt,
            execute_receipt: op.execute_receipt.unwrap_or_default(),
            replay_command: op.replay_command,
        }
    }
}

impl TryFrom<OperationRecord> for ProposedOperation {
    type Error = LedgerError;

    fn try_from(record: OperationRecord) -> Result<Self, Self::Error> {
        let target = parse_address(&record.target)?;
        let value = U256::from_str_radix(record.value.trim(), 10)
            .map_err(|_| LedgerError::InvalidRecord(format!("value '{}' is not a decimal amount", record.value)))?;
        let call = Call::from_json(&record.signature, record.param_types.as_slice(), &record.params)?;
        let data = record
            .data
            .strip_prefix("0x")
            .and_then(|h| hex::decode(h).ok())
            .ok_or_else(|| LedgerError::InvalidRecord(format!("data '{}' is not 0x hex", record.data)))?;
        if record.queue_receipt.trim().is_empty() {
            return Err(LedgerError::MissingQueueReceipt(record.description));
        }
        let execute_receipt = Some(record.execute_receipt).filter(|r| !r.trim().is_empty());

        Ok(Self {
            description: record.description,
            target,
            value,
            call,
            data,
            maturity_time: record.maturity_time,
            sequence_number: record.sequence_number,
            queue_receipt: record.queue_receipt,
            execute_receipt,
            replay_command: record.replay_command,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use timelock_abi::AbiValue;

    const FEE_CONTRACT: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

    fn queued() -> ProposedOperation {
        let call = Call::new("setFee(uint256)", &["uint256"], vec![AbiValue::uint(150)]).unwrap();
        let data = call.encode().unwrap();
        OperationDraft {
            description: "set fee to 150bps".to_string(),
            target: parse_address(FEE_CONTRACT).unwrap(),
            value: U256::ZERO,
            call,
            maturity_time: 1_700_086_400,
        }
        .record(QueueEvidence {
            data,
            sequence_number: Some(7),
            queue_receipt: "0xabc".to_string(),
            replay_command: "replay".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn serializes_with_camel_case_fields() {
        let json = serde_json::to_value(queued()).unwrap();
        assert_eq!(json["target"], json!(FEE_CONTRACT));
        assert_eq!(json["value"], json!("0"));
        assert_eq!(json["signature"], json!("setFee(uint256)"));
        assert_eq!(json["paramTypes"], json!(["uint256"]));
        assert_eq!(json["params"], json!([150]));
        assert_eq!(json["maturityTime"], json!(1_700_086_400u64));
        assert_eq!(json["sequenceNumber"], json!(7));
        assert_eq!(json["queueReceipt"], json!("0xabc"));
        assert_eq!(json["executeReceipt"], json!(""));
    }

    #[test]
    fn reads_back_what_it_writes() {
        let op = queued();
        let text = serde_json::to_string(&op).unwrap();
        let back: ProposedOperation = serde_json::from_str(&text).unwrap();
        assert_eq!(back, op);
        assert_eq!(back.state(), OperationState::Queued);
    }

    #[test]
    fn execute_receipt_is_write_once() {
        let mut op = queued();
        op.mark_executed("0xdef").unwrap();
        assert_eq!(op.state(), OperationState::Executed);

        let err = op.mark_executed("0x999").unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyExecuted { .. }));
        assert_eq!(op.execute_receipt(), Some("0xdef"));
    }

    #[test]
    fn record_requires_queue_receipt() {
        let call = Call::new("pause()", &[] as &[&str], vec![]).unwrap();
        let draft = OperationDraft {
            description: "pause".to_string(),
            target: Address::ZERO,
            value: U256::ZERO,
            call,
            maturity_time: 1,
        };
        let err = draft
            .record(QueueEvidence {
                data: vec![],
                sequence_number: None,
                queue_receipt: String::new(),
                replay_command: String::new(),
            })
            .unwrap_err();
        assert!(matches!(err, LedgerError::MissingQueueReceipt(_)));
    }

    #[test]
    fn tampered_params_are_rejected_on_load() {
        let mut json = serde_json::to_value(queued()).unwrap();
        json["params"] = json!(["not a number"]);
        assert!(serde_json::from_value::<ProposedOperation>(json).is_err());
    }

    #[test]
    fn pending_excludes_executed_matches() {
        let first = queued();
        let mut executed = first.clone();
        executed.mark_executed("0xdef").unwrap();

        assert!(pending(&[first.clone()], &[executed]).is_empty());
        assert_eq!(pending(&[first.clone()], &[]), vec![first]);
    }

    #[test]
    fn identical_entries_are_matched_one_for_one() {
        let op = queued();
        let mut executed = op.clone();
        executed.mark_executed("0xdef").unwrap();

        let remaining = pending(&[op.clone(), op.clone()], &[executed.clone()]);
        assert_eq!(remaining, vec![op.clone()]);
        assert!(pending(&[op.clone(), op], &[executed.clone(), executed]).is_empty());
    }
}
