//! Queue phase
//!
//! Per run:
//! - Building: every request is resolved and encoded in memory
//! - Submitting: drafts go to the delay contract one at a time, in plan order
//! - Recording: each confirmed operation is appended to the run's batch
//!
//! An operation that fails before its queue receipt exists is never written
//! to the ledger.

use crate::address_book::AddressBook;
use crate::config::GasPolicy;
use crate::contract::{CallKind, DelayContract, TimelockCall};
use crate::error::TimelockError;
use crate::plan::QueuePlan;
use crate::replay;
use crate::report::{OperationFailure, QueueReport, Stage};
use crate::sequence::SequenceAllocator;
use crate::submit;
use std::sync::Arc;
use timelock_ledger::{BatchName, Ledger, OperationDraft, ProposedOperation, QueueEvidence};

/// What a run does after an operation fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Stop at the first failure
    #[default]
    Abort,
    /// Report the failure and move on to the next operation
    Continue,
}

/// Submits plans to the delay contract and records them
pub struct QueuePhase {
    contract: Arc<dyn DelayContract>,
    ledger: Arc<Ledger>,
    book: AddressBook,
    gas: GasPolicy,
    use_sequence_numbers: bool,
    policy: FailurePolicy,
}

impl std::fmt::Debug for QueuePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuePhase")
            .field("ledger", &self.ledger.root())
            .field("gas", &self.gas)
            .field("use_sequence_numbers", &self.use_sequence_numbers)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl QueuePhase {
    /// Create a phase bound to one contract client and ledger
    #[must_use]
    pub fn new(contract: Arc<dyn DelayContract>, ledger: Arc<Ledger>, book: AddressBook) -> Self {
        Self {
            contract,
            ledger,
            book,
            gas: GasPolicy::default(),
            use_sequence_numbers: true,
            policy: FailurePolicy::default(),
        }
    }

    /// With gas policy
    #[inline]
    #[must_use]
    pub fn with_gas(mut self, gas: GasPolicy) -> Self {
        self.gas = gas;
        self
    }

    /// With or without explicit sequence numbers
    #[inline]
    #[must_use]
    pub fn with_sequence_numbers(mut self, enabled: bool) -> Self {
        self.use_sequence_numbers = enabled;
        self
    }

    /// With failure policy
    #[inline]
    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Queue every operation of `plan` into a new batch labelled `label`
    ///
    /// Per-operation failures end up in the report. A batch is only created
    /// once at least one operation is about to be submitted.
    ///
    /// # Errors
    /// Failures that affect the whole run: reading the chain time or the
    /// submitter's transaction count, or creating the batch
    pub async fn run(&self, label: &str, plan: &QueuePlan) -> Result<QueueReport, TimelockError> {
        let chain_time = self.contract.latest_timestamp().await?;
        tracing::info!(label, operations = plan.len(), chain_time, "queue run started");

        let mut failures = Vec::new();
        let mut drafts = Vec::with_capacity(plan.len());
        for (index, request) in plan.operations.iter().enumerate() {
            match request.resolve(&self.book, chain_time) {
                Ok(draft) => {
                    tracing::debug!(
                        description = %draft.description,
                        signature = %draft.call.signature(),
                        maturity_time = draft.maturity_time,
                        "operation built"
                    );
                    drafts.push((index, draft));
                }
                Err(error) => {
                    tracing::warn!(
                        description = %request.description,
                        target = %request.target,
                        signature = %request.signature,
                        %error,
                        "operation rejected before submission"
                    );
                    failures.push(OperationFailure {
                        index,
                        description: request.description.clone(),
                        stage: Stage::Building,
                        error,
                    });
                }
            }
        }

        if drafts.is_empty() || (!failures.is_empty() && self.policy == FailurePolicy::Abort) {
            tracing::warn!(label, failed = failures.len(), "nothing submitted");
            return Ok(QueueReport {
                batch: None,
                recorded: Vec::new(),
                skipped: drafts.len(),
                failures,
            });
        }

        let mut sequence = if self.use_sequence_numbers {
            Some(SequenceAllocator::from_chain(self.contract.as_ref()).await?)
        } else {
            None
        };
        let batch = self.ledger.create_batch(label).await?;

        let mut recorded = Vec::with_capacity(drafts.len());
        let mut skipped = 0;
        let mut remaining = drafts.into_iter();
        while let Some((index, draft)) = remaining.next() {
            let description = draft.description.clone();
            match self.queue_one(&batch, draft, sequence.as_mut()).await {
                Ok(op) => recorded.push(op),
                Err((stage, error)) => {
                    tracing::warn!(batch = %batch, description = %description, %stage, %error, "operation not queued");
                    failures.push(OperationFailure {
                        index,
                        description,
                        stage,
                        error,
                    });
                    // A ledger write failure leaves the batch unusable for the rest of the run
                    if stage == Stage::Recording || self.policy == FailurePolicy::Abort {
                        skipped = remaining.len();
                        break;
                    }
                }
            }
        }

        tracing::info!(
            batch = %batch,
            recorded = recorded.len(),
            failed = failures.len(),
            skipped,
            "queue run finished"
        );
        Ok(QueueReport {
            batch: Some(batch),
            recorded,
            failures,
            skipped,
        })
    }

    async fn queue_one(
        &self,
        batch: &BatchName,
        draft: OperationDraft,
        sequence: Option<&mut SequenceAllocator>,
    ) -> Result<ProposedOperation, (Stage, TimelockError)> {
        let call = TimelockCall::from_draft(&draft).map_err(|e| (Stage::Building, e.into()))?;
        let submitted = submit::send(self.contract.as_ref(), CallKind::Queue, &call, self.gas, sequence)
            .await
            .map_err(|e| (Stage::Submitting, e.into()))?;

        let replay_command = replay::render(draft.target, draft.value, &draft.call, draft.maturity_time);
        let receipt = submitted.receipt.tx_hash;
        let op = draft
            .record(QueueEvidence {
                data: call.data,
                sequence_number: submitted.nonce,
                queue_receipt: receipt.clone(),
                replay_command,
            })
            .map_err(|e| (Stage::Recording, e.into()))?;

        if let Err(e) = self.ledger.append(batch, &op).await {
            // Queued on-chain but missing from the ledger; log everything needed to recover it by hand
            tracing::error!(
                batch = %batch,
                description = op.description(),
                receipt = %receipt,
                replay = op.replay_command(),
                error = %e,
                "queued operation could not be recorded"
            );
            return Err((Stage::Recording, e.into()));
        }

        tracing::info!(
            batch = %batch,
            description = op.description(),
            target = %op.target(),
            signature = %op.call().signature(),
            nonce = op.sequence_number(),
            receipt = %receipt,
            "operation queued"
        );
        Ok(op)
    }
}
