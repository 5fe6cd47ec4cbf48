//! Ethereum JSON-RPC delay-contract client
//!
//! Talks to a node holding an unlocked sender account:
//! - `eth_getBlockByNumber` for the chain timestamp
//! - `eth_getTransactionCount` (pending) for the sequence start
//! - `eth_estimateGas` as the revert pre-flight
//! - `eth_sendTransaction`, then `eth_getTransactionReceipt` until mined

use crate::config::TimelockConfig;
use crate::contract::{CallKind, DelayContract, Receipt, SubmitOptions, TimelockCall};
use crate::error::{ConfigError, SubmissionError};
use alloy_primitives::{Bytes, U64};
use alloy_rpc_types::{Block, TransactionInput, TransactionReceipt, TransactionRequest};
use alloy_sol_types::{Revert, SolError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use timelock_abi::Address;

/// Compound-style timelock reached over HTTP JSON-RPC
#[derive(Debug)]
pub struct JsonRpcDelayContract {
    client: reqwest::Client,
    url: String,
    timelock: Address,
    sender: Address,
    confirmation_timeout: Duration,
    poll_interval: Duration,
    next_id: AtomicU64,
}

impl JsonRpcDelayContract {
    /// Client for `timelock`, submitting from `sender`
    #[must_use]
    pub fn new(url: impl Into<String>, timelock: Address, sender: Address) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            timelock,
            sender,
            confirmation_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(1),
            next_id: AtomicU64::new(1),
        }
    }

    /// Client built from validated configuration
    ///
    /// # Errors
    /// Missing or invalid addresses in `config`
    pub fn from_config(config: &TimelockConfig) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.rpc_url.clone(),
            config.timelock_address()?,
            config.sender_address()?,
        )
        .with_confirmation(config.confirmation_timeout(), config.poll_interval()))
    }

    /// With receipt wait limit and polling interval
    #[must_use]
    pub fn with_confirmation(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.confirmation_timeout = timeout;
        self.poll_interval = poll_interval;
        self
    }

    /// Delay contract address
    #[inline]
    #[must_use]
    pub fn timelock(&self) -> Address {
        self.timelock
    }

    /// Raw JSON-RPC call; a `null` result comes back as [`Value::Null`]
    async fn call(&self, method: &str, params: Value) -> Result<Value, SubmissionError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SubmissionError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SubmissionError::Transport(e.to_string()))?;
        if !status.is_success() && text.trim().is_empty() {
            return Err(SubmissionError::Transport(format!("{method}: http {status}")));
        }

        let envelope: RpcResponse = serde_json::from_str(&text)
            .map_err(|e| SubmissionError::InvalidResponse(format!("{method}: {e}")))?;
        match envelope.error {
            Some(error) => Err(error.into()),
            None => Ok(envelope.result),
        }
    }

    async fn request<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, SubmissionError> {
        match self.call(method, params).await? {
            Value::Null => Err(SubmissionError::InvalidResponse(format!("{method}: empty result"))),
            value => serde_json::from_value(value)
                .map_err(|e| SubmissionError::InvalidResponse(format!("{method}: {e}"))),
        }
    }

    fn transaction(&self, kind: CallKind, call: &TimelockCall, options: SubmitOptions) -> TransactionRequest {
        let input = TransactionInput::both(Bytes::from(call.calldata(kind)));
        let mut tx = TransactionRequest::default()
            .from(self.sender)
            .to(self.timelock)
            .value(call.attached_value(kind))
            .input(input);
        if let Some(nonce) = options.nonce {
            tx = tx.nonce(nonce);
        }
        if let Some(gas) = options.gas_limit {
            tx = tx.gas_limit(gas);
        }
        tx
    }

    /// Map an RPC error from a call to `kind` onto the submission taxonomy
    fn classify(kind: CallKind, error: SubmissionError) -> SubmissionError {
        match error {
            SubmissionError::Rpc { code, message } if code == 3 || message.to_lowercase().contains("revert") => {
                SubmissionError::reverted(kind, message)
            }
            other => other,
        }
    }

    async fn wait_for_receipt(&self, kind: CallKind, tx_hash: &str) -> Result<Receipt, SubmissionError> {
        let started = Instant::now();
        loop {
            let raw = self.call("eth_getTransactionReceipt", json!([tx_hash])).await?;
            if !raw.is_null() {
                let receipt: TransactionReceipt = serde_json::from_value(raw)
                    .map_err(|e| SubmissionError::InvalidResponse(format!("receipt for {tx_hash}: {e}")))?;
                return confirmed(kind, &receipt);
            }
            if started.elapsed() >= self.confirmation_timeout {
                return Err(SubmissionError::ConfirmationTimeout {
                    tx_hash: tx_hash.to_string(),
                    waited_secs: started.elapsed().as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl DelayContract for JsonRpcDelayContract {
    async fn latest_timestamp(&self) -> Result<u64, SubmissionError> {
        let block: Block = self.request("eth_getBlockByNumber", json!(["latest", false])).await?;
        Ok(block.header.timestamp)
    }

    async fn transaction_count(&self) -> Result<u64, SubmissionError> {
        let count: U64 = self
            .request("eth_getTransactionCount", json!([self.sender, "pending"]))
            .await?;
        Ok(count.to::<u64>())
    }

    async fn estimate(&self, kind: CallKind, call: &TimelockCall) -> Result<u64, SubmissionError> {
        let tx = self.transaction(kind, call, SubmitOptions::default());
        let gas: U64 = self
            .request("eth_estimateGas", json!([tx]))
            .await
            .map_err(|e| Self::classify(kind, e))?;
        Ok(gas.to::<u64>())
    }

    async fn submit(&self, kind: CallKind, call: &TimelockCall, options: SubmitOptions) -> Result<Receipt, SubmissionError> {
        let tx = self.transaction(kind, call, options);
        let tx_hash: String = self
            .request("eth_sendTransaction", json!([tx]))
            .await
            .map_err(|e| Self::classify(kind, e))?;
        tracing::debug!(%kind, tx_hash = %tx_hash, "transaction sent, awaiting receipt");
        self.wait_for_receipt(kind, &tx_hash).await
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl From<RpcError> for SubmissionError {
    /// Prefer the decoded `Error(string)` payload over the node's wording
    fn from(error: RpcError) -> Self {
        let decoded = error
            .data
            .as_ref()
            .and_then(|d| d.as_str().or_else(|| d.get("data").and_then(Value::as_str)))
            .and_then(decode_revert_reason);
        Self::Rpc {
            code: error.code,
            message: match decoded {
                Some(reason) => format!("execution reverted: {reason}"),
                None => error.message,
            },
        }
    }
}

/// Mined receipt as reported to the phases; a failed status is a revert
fn confirmed(kind: CallKind, receipt: &TransactionReceipt) -> Result<Receipt, SubmissionError> {
    let tx_hash = receipt.transaction_hash.to_string();
    if !receipt.status() {
        return Err(SubmissionError::reverted(kind, format!("transaction {tx_hash} reverted")));
    }
    Ok(Receipt {
        tx_hash,
        block_number: receipt.block_number,
        gas_used: u64::try_from(receipt.gas_used).ok(),
    })
}

/// Reason string from ABI-encoded `Error(string)` revert data
fn decode_revert_reason(data: &str) -> Option<String> {
    let bytes = hex::decode(data.strip_prefix("0x")?).ok()?;
    Revert::abi_decode_validate(&bytes).ok().map(|revert| revert.reason)
}
