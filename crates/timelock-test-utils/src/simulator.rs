//! In-memory Compound-style timelock
//!
//! Enforces the same rules as the on-chain contract against a clock the test
//! controls:
//! - queue: `eta >= now + delay`
//! - execute: queued, `now >= eta`, `now <= eta + grace_period`
//!
//! It also tracks the sender's nonce like a node would. A submission with a
//! nonce below the account's count is rejected as reused, one above it as a
//! gap; a reverted transaction is still mined and consumes its nonce.

use alloy_primitives::{keccak256, Address, B256};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use timelock_core::{CallKind, DelayContract, Receipt, SubmissionError, SubmitOptions, TimelockCall};

/// Compound `GRACE_PERIOD`
pub const GRACE_PERIOD: u64 = 14 * 24 * 60 * 60;

/// Gas reported by `estimate` for queue calls
pub const QUEUE_GAS: u64 = 60_000;

/// Gas reported by `estimate` for execute calls
pub const EXECUTE_GAS: u64 = 95_000;

/// Revert reasons, verbatim from the Compound timelock
pub mod reasons {
    pub const DELAY_NOT_SATISFIED: &str =
        "Timelock::queueTransaction: Estimated execution block must satisfy delay.";
    pub const NOT_QUEUED: &str = "Timelock::executeTransaction: Transaction hasn't been queued.";
    pub const TOO_EARLY: &str = "Timelock::executeTransaction: Transaction hasn't surpassed time lock.";
    pub const STALE: &str = "Timelock::executeTransaction: Transaction is stale.";
    pub const EXECUTION_REVERTED: &str = "Timelock::executeTransaction: Transaction execution reverted.";
    pub const OUT_OF_GAS: &str = "out of gas";
}

/// One transaction the simulator mined
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub kind: CallKind,
    pub call: TimelockCall,
    pub nonce: u64,
    pub gas_limit: Option<u64>,
    pub tx_hash: String,
    /// `None` on success, the revert reason otherwise
    pub revert_reason: Option<String>,
}

#[derive(Debug)]
struct State {
    now: u64,
    block_number: u64,
    nonce: u64,
    queued: HashSet<B256>,
    executed: HashSet<B256>,
    failing_targets: HashSet<Address>,
    injected: VecDeque<SubmissionError>,
    mined: Vec<SubmissionRecord>,
}

/// Simulated delay contract with a controllable clock
#[derive(Debug)]
pub struct SimulatedTimelock {
    delay: u64,
    grace_period: u64,
    state: Mutex<State>,
}

impl SimulatedTimelock {
    /// Timelock with `delay` seconds, clock starting at `now`
    pub fn new(now: u64, delay: u64) -> Self {
        Self {
            delay,
            grace_period: GRACE_PERIOD,
            state: Mutex::new(State {
                now,
                block_number: 1,
                nonce: 0,
                queued: HashSet::new(),
                executed: HashSet::new(),
                failing_targets: HashSet::new(),
                injected: VecDeque::new(),
                mined: Vec::new(),
            }),
        }
    }

    pub fn with_grace_period(mut self, grace_period: u64) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn delay(&self) -> u64 {
        self.delay
    }

    pub fn now(&self) -> u64 {
        self.state.lock().now
    }

    /// Move the clock forward
    pub fn advance(&self, seconds: u64) {
        self.state.lock().now += seconds;
    }

    pub fn set_time(&self, now: u64) {
        self.state.lock().now = now;
    }

    /// Sender's transaction count
    pub fn nonce(&self) -> u64 {
        self.state.lock().nonce
    }

    /// Pretend the sender already sent `nonce` transactions elsewhere
    pub fn set_nonce(&self, nonce: u64) {
        self.state.lock().nonce = nonce;
    }

    pub fn block_number(&self) -> u64 {
        self.state.lock().block_number
    }

    pub fn is_queued(&self, call: &TimelockCall) -> bool {
        let hash = call.hash();
        self.state.lock().queued.contains(&hash)
    }

    pub fn is_executed(&self, call: &TimelockCall) -> bool {
        let hash = call.hash();
        self.state.lock().executed.contains(&hash)
    }

    pub fn queued_count(&self) -> usize {
        self.state.lock().queued.len()
    }

    /// Every mined transaction, in order
    pub fn mined(&self) -> Vec<SubmissionRecord> {
        self.state.lock().mined.clone()
    }

    /// Next `submit` fails with `error` before anything reaches the chain
    pub fn fail_next_submission(&self, error: SubmissionError) {
        self.state.lock().injected.push_back(error);
    }

    /// Executions targeting `target` revert inside the target call
    pub fn fail_target(&self, target: Address) {
        self.state.lock().failing_targets.insert(target);
    }

    fn check(&self, state: &State, kind: CallKind, call: &TimelockCall) -> Result<B256, SubmissionError> {
        let hash = call.hash();
        let revert = |reason: &str| Err(SubmissionError::reverted(kind, reason));
        match kind {
            CallKind::Queue => {
                if call.eta < state.now + self.delay {
                    return revert(reasons::DELAY_NOT_SATISFIED);
                }
            }
            CallKind::Execute => {
                if !state.queued.contains(&hash) {
                    return revert(reasons::NOT_QUEUED);
                }
                if state.now < call.eta {
                    return revert(reasons::TOO_EARLY);
                }
                if state.now > call.eta + self.grace_period {
                    return revert(reasons::STALE);
                }
                if state.failing_targets.contains(&call.target) {
                    return revert(reasons::EXECUTION_REVERTED);
                }
            }
        }
        Ok(hash)
    }
}

fn gas_for(kind: CallKind) -> u64 {
    match kind {
        CallKind::Queue => QUEUE_GAS,
        CallKind::Execute => EXECUTE_GAS,
    }
}

#[async_trait]
impl DelayContract for SimulatedTimelock {
    async fn latest_timestamp(&self) -> Result<u64, SubmissionError> {
        Ok(self.now())
    }

    async fn transaction_count(&self) -> Result<u64, SubmissionError> {
        Ok(self.nonce())
    }

    async fn estimate(&self, kind: CallKind, call: &TimelockCall) -> Result<u64, SubmissionError> {
        let state = self.state.lock();
        self.check(&state, kind, call)?;
        Ok(gas_for(kind))
    }

    async fn submit(
        &self,
        kind: CallKind,
        call: &TimelockCall,
        options: SubmitOptions,
    ) -> Result<Receipt, SubmissionError> {
        let mut state = self.state.lock();
        if let Some(error) = state.injected.pop_front() {
            return Err(error);
        }

        let nonce = options.nonce.unwrap_or(state.nonce);
        if nonce < state.nonce {
            return Err(SubmissionError::Rpc {
                code: -32000,
                message: format!("nonce too low: next nonce {}, tx nonce {nonce}", state.nonce),
            });
        }
        if nonce > state.nonce {
            return Err(SubmissionError::Rpc {
                code: -32000,
                message: format!("nonce too high: next nonce {}, tx nonce {nonce}", state.nonce),
            });
        }

        let outcome = match options.gas_limit {
            Some(limit) if limit < gas_for(kind) => Err(SubmissionError::reverted(kind, reasons::OUT_OF_GAS)),
            _ => self.check(&state, kind, call),
        };

        // Mined either way
        state.nonce += 1;
        state.block_number += 1;
        let tx_hash = keccak256(format!("{kind}:{nonce}:{}", state.block_number)).to_string();
        state.mined.push(SubmissionRecord {
            kind,
            call: call.clone(),
            nonce,
            gas_limit: options.gas_limit,
            tx_hash: tx_hash.clone(),
            revert_reason: outcome
                .as_ref()
                .err()
                .and_then(|e| e.revert_reason().map(str::to_string)),
        });

        let hash = outcome?;
        match kind {
            CallKind::Queue => {
                state.queued.insert(hash);
            }
            CallKind::Execute => {
                state.queued.remove(&hash);
                state.executed.insert(hash);
            }
        }
        Ok(Receipt {
            tx_hash,
            block_number: Some(state.block_number),
            gas_used: Some(gas_for(kind)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    fn call(eta: u64) -> TimelockCall {
        TimelockCall {
            target: Address::repeat_byte(0x11),
            value: U256::ZERO,
            signature: "pause()".to_string(),
            data: Vec::new(),
            eta,
        }
    }

    #[tokio::test]
    async fn enforces_delay_and_maturity() {
        let chain = SimulatedTimelock::new(1_000, 100);

        let early = chain.estimate(CallKind::Queue, &call(1_050)).await.unwrap_err();
        assert_eq!(early.revert_reason(), Some(reasons::DELAY_NOT_SATISFIED));

        chain.submit(CallKind::Queue, &call(1_100), SubmitOptions::default()).await.unwrap();
        assert!(chain.is_queued(&call(1_100)));

        let too_early = chain.estimate(CallKind::Execute, &call(1_100)).await.unwrap_err();
        assert_eq!(too_early.revert_reason(), Some(reasons::TOO_EARLY));

        chain.advance(100);
        chain.submit(CallKind::Execute, &call(1_100), SubmitOptions::default()).await.unwrap();
        assert!(chain.is_executed(&call(1_100)));
        assert!(!chain.is_queued(&call(1_100)));
    }

    #[tokio::test]
    async fn stale_after_grace_period() {
        let chain = SimulatedTimelock::new(0, 10).with_grace_period(5);
        chain.submit(CallKind::Queue, &call(10), SubmitOptions::default()).await.unwrap();
        chain.set_time(16);

        let err = chain.estimate(CallKind::Execute, &call(10)).await.unwrap_err();
        assert_eq!(err.revert_reason(), Some(reasons::STALE));
    }

    #[tokio::test]
    async fn rejects_nonce_gaps_and_reuse() {
        let chain = SimulatedTimelock::new(0, 10);
        chain.set_nonce(5);

        let gap = SubmitOptions { nonce: Some(6), gas_limit: None };
        assert!(chain.submit(CallKind::Queue, &call(10), gap).await.unwrap_err().to_string().contains("too high"));

        let ok = SubmitOptions { nonce: Some(5), gas_limit: None };
        chain.submit(CallKind::Queue, &call(10), ok).await.unwrap();

        let reuse = chain.submit(CallKind::Queue, &call(11), ok).await.unwrap_err();
        assert!(reuse.to_string().contains("too low"));
        assert_eq!(chain.nonce(), 6);
    }

    #[tokio::test]
    async fn reverted_transactions_consume_nonce() {
        let chain = SimulatedTimelock::new(0, 10);
        let err = chain
            .submit(CallKind::Execute, &call(10), SubmitOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.revert_reason(), Some(reasons::NOT_QUEUED));
        assert_eq!(chain.nonce(), 1);
        assert_eq!(chain.mined()[0].revert_reason.as_deref(), Some(reasons::NOT_QUEUED));
    }

    #[tokio::test]
    async fn injected_failures_do_not_reach_the_chain() {
        let chain = SimulatedTimelock::new(0, 10);
        chain.fail_next_submission(SubmissionError::Transport("connection reset".into()));

        let err = chain.submit(CallKind::Queue, &call(10), SubmitOptions::default()).await.unwrap_err();
        assert!(matches!(err, SubmissionError::Transport(_)));
        assert_eq!(chain.nonce(), 0);
        assert!(chain.mined().is_empty());
    }
}
