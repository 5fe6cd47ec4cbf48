//! Estimate, allocate, send

use crate::config::GasPolicy;
use crate::contract::{CallKind, DelayContract, Receipt, SubmitOptions, TimelockCall};
use crate::error::SubmissionError;
use crate::sequence::SequenceAllocator;

/// A confirmed submission and the sequence slot it used
#[derive(Debug)]
pub(crate) struct Submitted {
    pub(crate) receipt: Receipt,
    pub(crate) nonce: Option<u64>,
}

/// Submit one call and wait for its receipt
///
/// The sequence slot is taken after estimation, so a call that would revert
/// never consumes one. Once taken, the slot stays consumed whatever happens.
pub(crate) async fn send(
    contract: &dyn DelayContract,
    kind: CallKind,
    call: &TimelockCall,
    gas: GasPolicy,
    sequence: Option<&mut SequenceAllocator>,
) -> Result<Submitted, SubmissionError> {
    let estimate = contract.estimate(kind, call).await?;
    let gas_limit = gas.apply(estimate);
    let nonce = sequence.map(SequenceAllocator::next_slot);

    tracing::debug!(%kind, target = %call.target, estimate, gas_limit, nonce, "sending transaction");
    let receipt = contract
        .submit(
            kind,
            call,
            SubmitOptions {
                nonce,
                gas_limit: Some(gas_limit),
            },
        )
        .await?;
    Ok(Submitted { receipt, nonce })
}
