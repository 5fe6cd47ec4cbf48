use proptest::prelude::*;
use timelock_abi::{AbiValue, Address, Call, U256};
use timelock_ledger::{Ledger, OperationDraft, ProposedOperation, QueueEvidence};

fn entry(index: usize, amount: u64) -> ProposedOperation {
    let call = Call::new("setLimit(uint64)", &["uint64"], vec![AbiValue::uint(amount)]).unwrap();
    let data = call.encode().unwrap();
    OperationDraft {
        description: format!("entry {index}"),
        target: Address::repeat_byte(0x42),
        value: U256::from(index as u64),
        call,
        maturity_time: 10_000,
    }
    .record(QueueEvidence {
        data,
        sequence_number: Some(index as u64),
        queue_receipt: format!("0x{index:064x}"),
        replay_command: format!("replay {index}"),
    })
    .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn read_returns_exactly_what_was_appended(amounts in proptest::collection::vec(any::<u64>(), 0..12)) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let ledger = Ledger::open(dir.path()).await.unwrap();
            let batch = ledger.create_batch("prop").await.unwrap();

            let expected: Vec<_> = amounts.iter().enumerate().map(|(i, a)| entry(i, *a)).collect();
            for op in &expected {
                ledger.append(&batch, op).await.unwrap();
            }

            let read = ledger.read_batch(&batch).await.unwrap();
            assert_eq!(read, expected);
        });
    }
}

#[tokio::test]
async fn rereading_is_read_only() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = Ledger::open(dir.path()).await.unwrap();
    let batch = ledger.create_batch("audit").await.unwrap();
    ledger.append(&batch, &entry(0, 5)).await.unwrap();

    let before = tokio::fs::read(ledger.path_of(&batch)).await.unwrap();
    let _ = ledger.read_batch(&batch).await.unwrap();
    let _ = ledger.read_batch(&batch).await.unwrap();
    let after = tokio::fs::read(ledger.path_of(&batch)).await.unwrap();
    assert_eq!(before, after);
}
