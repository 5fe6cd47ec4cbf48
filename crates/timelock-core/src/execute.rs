//! Execute phase
//!
//! Reads a queue batch, executes each pending entry in file order and writes
//! the executed entries to a new result batch. The source batch is never
//! modified. Entries that fail stay out of the result batch, so diffing the
//! two batches shows exactly what is still pending.
//!
//! Re-running the phase on the same source batch is the retry path. Earlier
//! result batches under the same result label are consulted first; entries
//! they already executed are carried into the new result batch with their
//! receipts and are not resubmitted.
//!
//! No local clock check happens here: an entry whose maturity time has not
//! passed is submitted anyway and the delay contract's revert is reported.

use crate::config::GasPolicy;
use crate::contract::{CallKind, DelayContract, TimelockCall};
use crate::error::TimelockError;
use crate::report::{ExecuteReport, OperationFailure, Stage};
use crate::sequence::SequenceAllocator;
use crate::submit;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use timelock_ledger::{pending, BatchName, Ledger, OperationKey, OperationState, ProposedOperation};

/// Suffix appended to the source label to name the result batch
pub const EXECUTED_SUFFIX: &str = "-executed";

/// Executes recorded batches against the delay contract
pub struct ExecutePhase {
    contract: Arc<dyn DelayContract>,
    ledger: Arc<Ledger>,
    gas: GasPolicy,
    use_sequence_numbers: bool,
    result_label: Option<String>,
}

impl std::fmt::Debug for ExecutePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutePhase")
            .field("ledger", &self.ledger.root())
            .field("gas", &self.gas)
            .field("use_sequence_numbers", &self.use_sequence_numbers)
            .field("result_label", &self.result_label)
            .finish_non_exhaustive()
    }
}

impl ExecutePhase {
    /// Create a phase bound to one contract client and ledger
    #[must_use]
    pub fn new(contract: Arc<dyn DelayContract>, ledger: Arc<Ledger>) -> Self {
        Self {
            contract,
            ledger,
            gas: GasPolicy::default(),
            use_sequence_numbers: true,
            result_label: None,
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

    /// Label for the result batch instead of `{source label}-executed`
    #[inline]
    #[must_use]
    pub fn with_result_label(mut self, label: impl Into<String>) -> Self {
        self.result_label = Some(label.into());
        self
    }

    /// Execute every pending entry of `source`
    ///
    /// Entries are attempted once each, strictly one after another. A failed
    /// entry is reported and the run moves on to the next one. Entries that an
    /// earlier run over `source` already executed are carried over instead.
    ///
    /// # Errors
    /// Failures that affect the whole run: reading the source or earlier
    /// result batches, reading the submitter's transaction count, or creating
    /// the result batch
    pub async fn run(&self, source: &BatchName) -> Result<ExecuteReport, TimelockError> {
        let entries = self.ledger.read_batch(source).await?;
        let label = self
            .result_label
            .clone()
            .unwrap_or_else(|| format!("{}{EXECUTED_SUFFIX}", source.label()));

        let earlier = self.earlier_results(source, &label).await?;
        let remaining = pending(&entries, &earlier).len();
        let mut done_before: HashMap<OperationKey, VecDeque<ProposedOperation>> = HashMap::new();
        for op in earlier {
            done_before.entry(op.key()).or_default().push_back(op);
        }

        let mut sequence = if self.use_sequence_numbers && remaining > 0 {
            Some(SequenceAllocator::from_chain(self.contract.as_ref()).await?)
        } else {
            None
        };
        let output = self.ledger.create_batch(&label).await?;
        tracing::info!(
            source = %source,
            output = %output,
            entries = entries.len(),
            pending = remaining,
            "execute run started"
        );

        let mut executed = Vec::with_capacity(remaining);
        let mut failures = Vec::new();
        let mut carried_over = 0;
        let mut skipped = 0;
        let total = entries.len();

        for (index, entry) in entries.into_iter().enumerate() {
            let description = entry.description().to_string();
            let earlier_run = done_before.get_mut(&entry.key()).and_then(VecDeque::pop_front);
            let outcome = match (entry.state(), earlier_run) {
                (OperationState::Executed, _) => self.carry_over(&output, &entry).await.map(|()| None),
                (OperationState::Queued, Some(done)) => self.carry_over(&output, &done).await.map(|()| None),
                (OperationState::Queued, None) => {
                    self.execute_one(&output, entry, sequence.as_mut()).await.map(Some)
                }
            };

            match outcome {
                Ok(Some(op)) => executed.push(op),
                Ok(None) => carried_over += 1,
                Err((stage, error)) => {
                    tracing::warn!(
                        source = %source,
                        description = %description,
                        %stage,
                        reason = error_reason(&error),
                        %error,
                        "entry not executed"
                    );
                    failures.push(OperationFailure {
                        index,
                        description,
                        stage,
                        error,
                    });
                    if stage == Stage::Recording {
                        skipped = total - index - 1;
                        break;
                    }
                }
            }
        }

        tracing::info!(
            output = %output,
            executed = executed.len(),
            carried_over,
            failed = failures.len(),
            skipped,
            "execute run finished"
        );
        Ok(ExecuteReport {
            source: source.clone(),
            output,
            executed,
            carried_over,
            failures,
            skipped,
        })
    }

    /// Executed entries from result batches labelled `label` created since `source`
    ///
    /// Result batches are cumulative, so an execution shows up in every later
    /// one; entries are deduplicated by execute receipt.
    async fn earlier_results(&self, source: &BatchName, label: &str) -> Result<Vec<ProposedOperation>, TimelockError> {
        let mut receipts = HashSet::new();
        let mut executed = Vec::new();
        for batch in self.ledger.list_batches().await? {
            if batch.label() != label || batch.created_at() < source.created_at() || batch == *source {
                continue;
            }
            for op in self.ledger.read_batch(&batch).await? {
                let fresh = op.execute_receipt().is_some_and(|r| receipts.insert(r.to_string()));
                if fresh {
                    executed.push(op);
                }
            }
        }
        if !executed.is_empty() {
            tracing::debug!(source = %source, label, found = executed.len(), "earlier executions found");
        }
        Ok(executed)
    }

    async fn carry_over(&self, output: &BatchName, entry: &ProposedOperation) -> Result<(), (Stage, TimelockError)> {
        self.ledger
            .append(output, entry)
            .await
            .map_err(|e| (Stage::Recording, e.into()))?;
        tracing::debug!(output = %output, description = entry.description(), "already executed, carried over");
        Ok(())
    }

    async fn execute_one(
        &self,
        output: &BatchName,
        mut entry: ProposedOperation,
        sequence: Option<&mut SequenceAllocator>,
    ) -> Result<ProposedOperation, (Stage, TimelockError)> {
        let reencoded = entry.call().encode().map_err(|e| (Stage::Building, e.into()))?;
        if reencoded != entry.data() {
            return Err((
                Stage::Building,
                TimelockError::DataMismatch {
                    description: entry.description().to_string(),
                    recorded: format!("0x{}", hex::encode(entry.data())),
                    reencoded: format!("0x{}", hex::encode(&reencoded)),
                },
            ));
        }

        let call = TimelockCall::from_recorded(&entry);
        let submitted = submit::send(self.contract.as_ref(), CallKind::Execute, &call, self.gas, sequence)
            .await
            .map_err(|e| (Stage::Submitting, e.into()))?;
        let receipt = submitted.receipt.tx_hash;

        entry
            .mark_executed(receipt.clone())
            .map_err(|e| (Stage::Recording, e.into()))?;
        if let Err(e) = self.ledger.append(output, &entry).await {
            tracing::error!(
                output = %output,
                description = entry.description(),
                receipt = %receipt,
                error = %e,
                "executed operation could not be recorded"
            );
            return Err((Stage::Recording, e.into()));
        }

        tracing::info!(
            output = %output,
            description = entry.description(),
            target = %entry.target(),
            signature = %entry.call().signature(),
            nonce = submitted.nonce,
            receipt = %receipt,
            "operation executed"
        );
        Ok(entry)
    }
}

fn error_reason(error: &TimelockError) -> &str {
    match error {
        TimelockError::Submission(e) => e.revert_reason().unwrap_or(""),
        _ => "",
    }
}
