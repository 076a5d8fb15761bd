//! Transaction submission against an in-memory ledger.

use alloy::primitives::{Address, Bytes, U256};
use std::sync::Arc;

use poll_relay::blockchain::client::classify_broadcast_error;
use poll_relay::blockchain::transaction::TransactionSubmitter;
use poll_relay::blockchain::types::{BroadcastError, EncodedCall, LedgerError, SubmissionOutcome};
use poll_relay::error::RelayError;

mod common;
use common::{controller, fast_policy, DeadLedger, MockLedger, Script};

fn contract_call() -> EncodedCall {
    EncodedCall::new(
        Address::repeat_byte(0xcc),
        Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef]),
        "vote",
    )
}

fn submitter(ledger: &Arc<MockLedger>) -> TransactionSubmitter {
    TransactionSubmitter::new(ledger.clone(), fast_policy())
}

#[tokio::test]
async fn test_happy_path_confirms() {
    let ledger = Arc::new(MockLedger::new());
    let signer = controller();
    ledger.set_nonce(signer.address(), 7);

    let outcome = submitter(&ledger).submit(&contract_call(), &signer).await.unwrap();

    let tx = match outcome {
        SubmissionOutcome::Confirmed(tx) => tx,
        other => panic!("expected confirmation, got {other}"),
    };
    let broadcasts = ledger.broadcasts();
    assert_eq!(broadcasts.len(), 1);
    assert_eq!(broadcasts[0].hash, tx.tx_hash);
    assert_eq!(broadcasts[0].nonce, 7);
    assert_eq!(broadcasts[0].sender, signer.address());
    assert_eq!(broadcasts[0].tip, 1_500_000_000);
    // base fee 1 gwei * 2 + tip
    assert_eq!(broadcasts[0].max_fee, 3_500_000_000);
}

#[tokio::test]
async fn test_failed_preflight_never_broadcasts() {
    let ledger = Arc::new(MockLedger::new());
    ledger.revert_preflight("Poll is not active");

    let outcome = submitter(&ledger).submit(&contract_call(), &controller()).await.unwrap();

    assert_eq!(
        outcome,
        SubmissionOutcome::WouldRevert {
            reason: "Poll is not active".to_string()
        }
    );
    assert_eq!(ledger.broadcast_count(), 0);
}

#[tokio::test]
async fn test_underpriced_retry_uses_higher_tip() {
    let ledger = Arc::new(MockLedger::new());
    ledger.script(Script::Reject(BroadcastError::Underpriced(
        "replacement transaction underpriced".to_string(),
    )));

    let outcome = submitter(&ledger).submit(&contract_call(), &controller()).await.unwrap();

    assert!(outcome.is_confirmed(), "got {outcome}");
    let broadcasts = ledger.broadcasts();
    assert_eq!(broadcasts.len(), 2);
    assert!(!broadcasts[0].accepted);
    assert!(broadcasts[1].accepted);
    assert!(broadcasts[1].tip > broadcasts[0].tip);
    assert!(broadcasts[1].tip >= broadcasts[0].tip + broadcasts[0].tip / 4);
    // Fee bumps replace at the same nonce.
    assert_eq!(broadcasts[0].nonce, broadcasts[1].nonce);
}

#[tokio::test]
async fn test_attempts_are_bounded() {
    let ledger = Arc::new(MockLedger::new());
    for _ in 0..10 {
        ledger.script(Script::Reject(BroadcastError::Underpriced(
            "transaction underpriced".to_string(),
        )));
    }

    let outcome = submitter(&ledger).submit(&contract_call(), &controller()).await.unwrap();

    let broadcasts = ledger.broadcasts();
    assert_eq!(broadcasts.len(), 5);
    match outcome {
        SubmissionOutcome::Failed {
            last_tx_hash,
            attempts,
            ..
        } => {
            assert_eq!(attempts, 5);
            assert_eq!(last_tx_hash, Some(broadcasts[4].hash));
        }
        other => panic!("expected failure, got {other}"),
    }
    // Every attempt paid strictly more than the one before.
    assert!(broadcasts.windows(2).all(|w| w[1].tip > w[0].tip));
}

#[tokio::test]
async fn test_nonce_conflict_resyncs_without_fee_bump() {
    let ledger = Arc::new(MockLedger::new());
    ledger.script(Script::NonceTaken);

    let outcome = submitter(&ledger).submit(&contract_call(), &controller()).await.unwrap();

    assert!(outcome.is_confirmed(), "got {outcome}");
    let broadcasts = ledger.broadcasts();
    assert_eq!(broadcasts.len(), 2);
    assert_eq!(broadcasts[0].nonce, 0);
    assert_eq!(broadcasts[1].nonce, 1);
    assert_eq!(broadcasts[0].tip, broadcasts[1].tip);
}

#[tokio::test]
async fn test_nonce_conflict_at_same_nonce_bumps_tip() {
    let ledger = Arc::new(MockLedger::new());
    ledger.script(Script::Reject(BroadcastError::NonceConflict(
        "already known".to_string(),
    )));

    let outcome = submitter(&ledger).submit(&contract_call(), &controller()).await.unwrap();

    assert!(outcome.is_confirmed(), "got {outcome}");
    let broadcasts = ledger.broadcasts();
    assert_eq!(broadcasts[0].nonce, broadcasts[1].nonce);
    assert!(broadcasts[1].tip > broadcasts[0].tip);
}

#[tokio::test]
async fn test_other_rejection_is_terminal() {
    let ledger = Arc::new(MockLedger::new());
    ledger.script(Script::Reject(BroadcastError::Other(
        "insufficient funds for gas * price + value".to_string(),
    )));

    let outcome = submitter(&ledger).submit(&contract_call(), &controller()).await.unwrap();

    assert_eq!(ledger.broadcast_count(), 1);
    match outcome {
        SubmissionOutcome::Failed {
            reason, attempts, ..
        } => {
            assert!(reason.contains("insufficient funds"));
            assert_eq!(attempts, 1);
        }
        other => panic!("expected failure, got {other}"),
    }
}

#[tokio::test]
async fn test_fee_cap_stops_before_broadcast() {
    let ledger = Arc::new(MockLedger::new());
    // 400 gwei base fee * 2 exceeds the 500 gwei cap.
    ledger.set_base_fee(400_000_000_000);

    let outcome = submitter(&ledger).submit(&contract_call(), &controller()).await.unwrap();

    assert!(matches!(outcome, SubmissionOutcome::Failed { attempts: 0, last_tx_hash: None, .. }));
    assert_eq!(ledger.broadcast_count(), 0);
}

#[tokio::test]
async fn test_onchain_revert_is_not_retried() {
    let ledger = Arc::new(MockLedger::new());
    ledger.revert_on_chain();

    let outcome = submitter(&ledger).submit(&contract_call(), &controller()).await.unwrap();

    assert!(matches!(outcome, SubmissionOutcome::Reverted { .. }));
    assert_eq!(ledger.broadcast_count(), 1);
    assert!(matches!(
        outcome.into_confirmed(),
        Err(RelayError::Reverted { .. })
    ));
}

#[tokio::test]
async fn test_unmined_transaction_times_out() {
    let ledger = Arc::new(MockLedger::new());
    ledger.stop_mining();

    let outcome = submitter(&ledger).submit(&contract_call(), &controller()).await.unwrap();

    let broadcasts = ledger.broadcasts();
    assert_eq!(broadcasts.len(), 1);
    assert_eq!(
        outcome,
        SubmissionOutcome::Timeout {
            tx_hash: broadcasts[0].hash
        }
    );
}

#[tokio::test]
async fn test_at_most_one_inclusion_per_submission() {
    let ledger = Arc::new(MockLedger::new());
    ledger.script(Script::Reject(BroadcastError::Underpriced("fee too low".into())));
    ledger.script(Script::NonceTaken);
    ledger.script(Script::Reject(BroadcastError::NonceConflict("known transaction".into())));

    let outcome = submitter(&ledger).submit(&contract_call(), &controller()).await.unwrap();

    assert!(outcome.is_confirmed());
    assert_eq!(ledger.successful_receipts(), 1);
    assert_eq!(ledger.broadcasts().iter().filter(|b| b.accepted).count(), 1);
}

#[tokio::test]
async fn test_same_signer_submissions_get_distinct_nonces() {
    let ledger = Arc::new(MockLedger::new());
    let submitter = Arc::new(submitter(&ledger));
    let signer = controller();

    let first = {
        let (submitter, signer) = (submitter.clone(), signer.clone());
        tokio::spawn(async move { submitter.submit(&contract_call(), &signer).await })
    };
    let second = {
        let (submitter, signer) = (submitter.clone(), signer.clone());
        tokio::spawn(async move {
            submitter
                .submit(&EncodedCall::transfer(Address::repeat_byte(1), U256::from(1)), &signer)
                .await
        })
    };

    assert!(first.await.unwrap().unwrap().is_confirmed());
    assert!(second.await.unwrap().unwrap().is_confirmed());

    let mut nonces: Vec<u64> = ledger.broadcasts().iter().map(|b| b.nonce).collect();
    nonces.sort();
    assert_eq!(nonces, vec![0, 1]);
}

#[tokio::test]
async fn test_unreachable_node_is_an_error() {
    let submitter = TransactionSubmitter::new(Arc::new(DeadLedger), fast_policy());

    let err = submitter.submit(&contract_call(), &controller()).await.unwrap_err();

    assert!(matches!(err, RelayError::Connection(_)));
}

#[tokio::test]
async fn test_already_known_after_failover_waits_on_first_payload() {
    let ledger = Arc::new(MockLedger::new());
    ledger.script(Script::AcceptThenReport(classify_broadcast_error(
        "already known",
    )));

    let outcome = submitter(&ledger).submit(&contract_call(), &controller()).await.unwrap();

    let broadcasts = ledger.broadcasts();
    assert_eq!(broadcasts.len(), 1);
    assert_eq!(ledger.successful_receipts(), 1);
    match outcome {
        SubmissionOutcome::Confirmed(tx) => assert_eq!(tx.tx_hash, broadcasts[0].hash),
        other => panic!("expected confirmation, got {other}"),
    }
}

#[tokio::test]
async fn test_transport_error_after_acceptance_still_confirms() {
    let ledger = Arc::new(MockLedger::new());
    ledger.script(Script::AcceptThenReport(BroadcastError::Ledger(
        LedgerError::Timeout(30),
    )));

    let outcome = submitter(&ledger).submit(&contract_call(), &controller()).await.unwrap();

    assert!(outcome.is_confirmed(), "got {outcome}");
    assert_eq!(ledger.broadcast_count(), 1);
    assert_eq!(ledger.successful_receipts(), 1);
}

#[tokio::test]
async fn test_transport_error_before_acceptance_is_an_error() {
    let ledger = Arc::new(MockLedger::new());
    ledger.script(Script::Reject(BroadcastError::Ledger(LedgerError::Connection(
        "connection reset".to_string(),
    ))));

    let err = submitter(&ledger).submit(&contract_call(), &controller()).await.unwrap_err();

    assert!(matches!(err, RelayError::Connection(_)));
    assert_eq!(ledger.successful_receipts(), 0);
}

#[tokio::test]
async fn test_lost_receipts_keep_the_hash() {
    let ledger = Arc::new(MockLedger::new());
    ledger.fail_receipts();

    let outcome = submitter(&ledger).submit(&contract_call(), &controller()).await.unwrap();

    let broadcasts = ledger.broadcasts();
    assert_eq!(broadcasts.len(), 1);
    assert_eq!(
        outcome,
        SubmissionOutcome::Timeout {
            tx_hash: broadcasts[0].hash
        }
    );
}
