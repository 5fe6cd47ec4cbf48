//! Caller-facing operation requests
//!
//! A plan file lists the operations one queue run should submit, in order.
//! It is either a bare list or an object with an `operations` list, in JSON or
//! YAML (chosen by extension):
//!
//! ```yaml
//! operations:
//!   - description: set fee to 150bps
//!     target: FeeController
//!     signature: setFee(uint256)
//!     paramTypes: [uint256]
//!     params: [150]
//!     delaySeconds: 172800
//! ```

use crate::address_book::AddressBook;
use crate::error::{ConfigError, TimelockError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use timelock_abi::{AbiType, AbiValue, Call, U256};
use timelock_ledger::OperationDraft;

/// One operation as the caller describes it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    /// Free-text description
    pub description: String,
    /// Literal address or logical name
    pub target: String,
    /// Native currency amount, decimal or `0x` hex; zero when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Function signature
    pub signature: String,
    /// ABI type tags, parallel to `params`
    #[serde(default)]
    pub param_types: Vec<String>,
    /// Parameter values
    #[serde(default)]
    pub params: Vec<Value>,
    /// Absolute maturity timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maturity_time: Option<u64>,
    /// Maturity relative to the chain time at queue time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_seconds: Option<u64>,
}

impl OperationRequest {
    /// Request with no parameters, value or schedule set
    #[must_use]
    pub fn new(description: impl Into<String>, target: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            target: target.into(),
            value: None,
            signature: signature.into(),
            param_types: Vec::new(),
            params: Vec::new(),
            maturity_time: None,
            delay_seconds: None,
        }
    }

    /// With one typed parameter appended
    #[must_use]
    pub fn with_param(mut self, ty: impl Into<String>, value: Value) -> Self {
        self.param_types.push(ty.into());
        self.params.push(value);
        self
    }

    /// With attached native currency
    #[must_use]
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Mature at an absolute timestamp
    #[must_use]
    pub fn with_maturity_time(mut self, maturity_time: u64) -> Self {
        self.maturity_time = Some(maturity_time);
        self.delay_seconds = None;
        self
    }

    /// Mature a fixed delay after queue time
    #[must_use]
    pub fn with_delay(mut self, delay_seconds: u64) -> Self {
        self.delay_seconds = Some(delay_seconds);
        self.maturity_time = None;
        self
    }

    /// Absolute maturity given the chain time at queue time
    ///
    /// # Errors
    /// - [`TimelockError::InvalidPlan`] unless exactly one of `maturityTime` and
    ///   `delaySeconds` is set, or on overflow
    /// - [`TimelockError::MaturityNotInFuture`] unless the result lies strictly
    ///   after `chain_time`
    pub fn maturity(&self, chain_time: u64) -> Result<u64, TimelockError> {
        let maturity_time = match (self.maturity_time, self.delay_seconds) {
            (Some(at), None) => at,
            (None, Some(delay)) => chain_time.checked_add(delay).ok_or_else(|| {
                TimelockError::InvalidPlan(format!("'{}': delay overflows", self.description))
            })?,
            _ => {
                return Err(TimelockError::InvalidPlan(format!(
                    "'{}': set exactly one of maturityTime and delaySeconds",
                    self.description
                )))
            }
        };
        if maturity_time <= chain_time {
            return Err(TimelockError::MaturityNotInFuture {
                maturity_time,
                chain_time,
            });
        }
        Ok(maturity_time)
    }

    /// Validate and resolve into a draft ready for submission
    ///
    /// # Errors
    /// Target, value, encoding or maturity failures; nothing is submitted for
    /// a request that fails here
    pub fn resolve(&self, book: &AddressBook, chain_time: u64) -> Result<OperationDraft, TimelockError> {
        let target = book.resolve(&self.target)?;
        let value = match &self.value {
            None => U256::ZERO,
            Some(json) => match AbiValue::from_json(&AbiType::uint(256), json)? {
                AbiValue::Uint(v) => v,
                other => {
                    return Err(TimelockError::InvalidPlan(format!(
                        "'{}': value must be an unsigned amount, got {}",
                        self.description,
                        other.kind()
                    )))
                }
            },
        };
        let call = Call::from_json(&self.signature, self.param_types.as_slice(), &self.params)?;
        let maturity_time = self.maturity(chain_time)?;

        Ok(OperationDraft {
            description: self.description.clone(),
            target,
            value,
            call,
            maturity_time,
        })
    }
}

/// Ordered list of requests for one queue run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueuePlan {
    /// Requests in submission order
    pub operations: Vec<OperationRequest>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PlanFile {
    List(Vec<OperationRequest>),
    Wrapped { operations: Vec<OperationRequest> },
}

impl From<PlanFile> for QueuePlan {
    fn from(file: PlanFile) -> Self {
        match file {
            PlanFile::List(operations) | PlanFile::Wrapped { operations } => Self { operations },
        }
    }
}

impl QueuePlan {
    /// Plan from requests
    #[must_use]
    pub fn new(operations: Vec<OperationRequest>) -> Self {
        Self { operations }
    }

    /// Parse JSON text
    ///
    /// # Errors
    /// [`ConfigError::Parse`] on malformed input
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str::<PlanFile>(text)
            .map(Into::into)
            .map_err(|e| ConfigError::parse_error("<json>", e))
    }

    /// Parse YAML text
    ///
    /// # Errors
    /// [`ConfigError::Parse`] on malformed input
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str::<PlanFile>(text)
            .map(Into::into)
            .map_err(|e| ConfigError::parse_error("<yaml>", e))
    }

    /// Load a `.json`, `.yaml` or `.yml` plan file
    ///
    /// # Errors
    /// [`ConfigError::Io`] or [`ConfigError::Parse`]
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::io_error(path, e))?;
        let yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml")
        );
        let parsed = if yaml {
            serde_yaml::from_str::<PlanFile>(&text).map_err(|e| ConfigError::parse_error(path, e))
        } else {
            serde_json::from_str::<PlanFile>(&text).map_err(|e| ConfigError::parse_error(path, e))
        };
        Ok(parsed?.into())
    }

    /// Number of requests
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the plan is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use timelock_abi::parse_address;

    const FEE_CONTRACT: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";

    fn book() -> AddressBook {
        AddressBook::new().with_entry("FeeController", parse_address(FEE_CONTRACT).unwrap())
    }

    #[test]
    fn json_and_yaml_plans_agree() {
        let from_json = QueuePlan::from_json_str(
            r#"[{"description": "set fee", "target": "FeeController", "signature": "setFee(uint256)",
                 "paramTypes": ["uint256"], "params": [150], "delaySeconds": 86400}]"#,
        )
        .unwrap();
        let from_yaml = QueuePlan::from_yaml_str(
            "operations:\n  - description: set fee\n    target: FeeController\n    signature: setFee(uint256)\n    paramTypes: [uint256]\n    params: [150]\n    delaySeconds: 86400\n",
        )
        .unwrap();

        assert_eq!(from_json, from_yaml);
        assert_eq!(from_json.len(), 1);
    }

    #[test]
    fn resolves_relative_delay_against_chain_time() {
        let request = OperationRequest::new("set fee", "FeeController", "setFee(uint256)")
            .with_param("uint256", json!(150))
            .with_delay(86_400);
        let draft = request.resolve(&book(), 1_000).unwrap();

        assert_eq!(draft.maturity_time, 87_400);
        assert_eq!(draft.target, parse_address(FEE_CONTRACT).unwrap());
        assert_eq!(draft.value, U256::ZERO);
        assert_eq!(draft.call.signature().canonical(), "setFee(uint256)");
    }

    #[test]
    fn maturity_must_be_strictly_in_the_future() {
        let request = OperationRequest::new("now", FEE_CONTRACT, "pause()").with_maturity_time(1_000);
        assert!(matches!(
            request.maturity(1_000),
            Err(TimelockError::MaturityNotInFuture { maturity_time: 1_000, chain_time: 1_000 })
        ));
        assert_eq!(request.maturity(999).unwrap(), 1_000);
    }

    #[test]
    fn schedule_must_be_unambiguous() {
        let mut request = OperationRequest::new("both", FEE_CONTRACT, "pause()").with_delay(10);
        request.maturity_time = Some(5_000);
        assert!(matches!(request.maturity(0), Err(TimelockError::InvalidPlan(_))));

        let neither = OperationRequest::new("neither", FEE_CONTRACT, "pause()");
        assert!(matches!(neither.maturity(0), Err(TimelockError::InvalidPlan(_))));
    }

    #[test]
    fn mismatched_types_fail_before_submission() {
        let request = OperationRequest::new("bad", "FeeController", "setFee(uint256)")
            .with_param("address", json!(FEE_CONTRACT))
            .with_delay(10);
        let err = request.resolve(&book(), 0).unwrap_err();
        assert!(matches!(err, TimelockError::Encoding(e) if e.is_mismatch()));
    }

    #[test]
    fn value_accepts_decimal_strings() {
        let request = OperationRequest::new("fund", "FeeController", "deposit()")
            .with_value(json!("1000000000000000000"))
            .with_delay(10);
        let draft = request.resolve(&book(), 0).unwrap();
        assert_eq!(draft.value, U256::from(1_000_000_000_000_000_000u64));
    }

    #[test]
    fn demo_plan_resolves_against_demo_book() {
        let plan = QueuePlan::from_yaml_str(include_str!("../../../demos/fees.yaml")).unwrap();
        let book = book().with_entry("Treasury", parse_address("0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359").unwrap());
        assert_eq!(plan.len(), 2);
        for request in &plan.operations {
            assert_eq!(request.resolve(&book, 0).unwrap().maturity_time, 172_800);
        }
    }
}
