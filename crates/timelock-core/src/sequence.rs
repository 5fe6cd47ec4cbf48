//! Per-run sequence number allocation
//!
//! One counter per run, seeded from the submitter's on-chain transaction
//! count. Slots are handed out in submission order and never handed out twice,
//! even when the submission that used a slot fails.

use crate::contract::DelayContract;
use crate::error::SubmissionError;

/// Monotonic nonce counter owned by a single run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceAllocator {
    start: u64,
    next: u64,
}

impl SequenceAllocator {
    /// Counter starting at `start`
    #[must_use]
    pub fn new(start: u64) -> Self {
        Self { start, next: start }
    }

    /// Counter seeded from the submitter's current transaction count
    ///
    /// # Errors
    /// Propagates the client's failure to report the count
    pub async fn from_chain(contract: &dyn DelayContract) -> Result<Self, SubmissionError> {
        let start = contract.transaction_count().await?;
        tracing::debug!(start, "sequence allocator initialized");
        Ok(Self::new(start))
    }

    /// Issue the next slot
    pub fn next_slot(&mut self) -> u64 {
        let slot = self.next;
        self.next += 1;
        slot
    }

    /// Slot the next call to [`SequenceAllocator::next_slot`] will return
    #[inline]
    #[must_use]
    pub fn peek(&self) -> u64 {
        self.next
    }

    /// Count observed when the run started
    #[inline]
    #[must_use]
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Number of slots consumed so far
    #[inline]
    #[must_use]
    pub fn issued(&self) -> u64 {
        self.next - self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn starts_at_observed_count() {
        let mut seq = SequenceAllocator::new(42);
        assert_eq!(seq.peek(), 42);
        assert_eq!(seq.next_slot(), 42);
        assert_eq!(seq.next_slot(), 43);
        assert_eq!(seq.issued(), 2);
        assert_eq!(seq.start(), 42);
    }

    proptest! {
        #[test]
        fn slots_are_contiguous_and_increasing(start in 0u64..1_000_000, n in 0usize..64) {
            let mut seq = SequenceAllocator::new(start);
            let slots: Vec<u64> = (0..n).map(|_| seq.next_slot()).collect();

            let expected: Vec<u64> = (start..start + n as u64).collect();
            prop_assert_eq!(slots, expected);
            prop_assert_eq!(seq.issued(), n as u64);
        }
    }
}
