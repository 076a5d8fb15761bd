//! Transaction submission with bounded fee-bump and nonce-resync retries.
//!
//! # States
//! ```text
//! Preflight → Estimating → Building → Signing → Broadcasting → Confirming
//!     │            │            ▲                     │              │
//!     └─ WouldRevert            └── Underpriced ──────┤              ├─ Confirmed
//!                                └─ NonceConflict ────┤              ├─ Reverted
//!                                                     └─ Failed      └─ Timeout
//! ```
//!
//! Once one broadcast is accepted the submission only waits; it never sends a
//! second payload, so at most one of its transactions can be included.
//!
//! A rejection does not prove the payload missed every node: with failover
//! the primary may have taken it before a backup answered "already known".
//! Before retrying, the submitter asks the node about every payload it has
//! sent and waits on any that turn up.

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, TxHash};
use alloy::rpc::types::TransactionRequest;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{interval, sleep, timeout};
use uuid::Uuid;

use crate::blockchain::client::LedgerClient;
use crate::blockchain::lanes::SignerLanes;
use crate::blockchain::types::{
    BroadcastError, CallError, ConfirmedTx, EncodedCall, LedgerError, SubmissionConfig,
    SubmissionOutcome,
};
use crate::blockchain::wallet::Wallet;
use crate::error::RelayResult;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;

const WEI_PER_GWEI: u128 = 1_000_000_000;

/// Tip after one bump: at least 25% higher and at least one wei higher.
pub fn bumped_tip(tip: u128) -> u128 {
    tip.saturating_add(tip.div_ceil(4).max(1))
}

/// Max fee covering `multiplier` times the base fee plus the tip.
pub fn max_fee_per_gas(base_fee: u128, tip: u128, multiplier: u64) -> u128 {
    base_fee
        .saturating_mul(u128::from(multiplier))
        .saturating_add(tip)
}

/// Mutable state of one in-flight submission.
#[derive(Debug, Clone)]
struct PendingSubmission {
    id: Uuid,
    signer: Address,
    nonce: u64,
    gas_limit: u64,
    base_fee: u128,
    tip: u128,
    attempts: u32,
    last_tx_hash: Option<TxHash>,
    sent: Vec<TxHash>,
}

impl PendingSubmission {
    fn bump_tip(&mut self) {
        self.tip = bumped_tip(self.tip);
        metrics::record_fee_bump();
    }

    fn failed(&self, reason: impl Into<String>) -> SubmissionOutcome {
        SubmissionOutcome::Failed {
            reason: reason.into(),
            last_tx_hash: self.last_tx_hash,
            attempts: self.attempts,
        }
    }
}

/// Drives calls from encoded form to a terminal outcome.
pub struct TransactionSubmitter {
    ledger: Arc<dyn LedgerClient>,
    policy: SubmissionConfig,
    lanes: SignerLanes,
}

impl TransactionSubmitter {
    pub fn new(ledger: Arc<dyn LedgerClient>, policy: SubmissionConfig) -> Self {
        Self {
            ledger,
            policy,
            lanes: SignerLanes::new(),
        }
    }

    pub fn policy(&self) -> &SubmissionConfig {
        &self.policy
    }

    /// Submit `call` signed by `signer` and wait for a terminal outcome.
    ///
    /// Submissions from the same signer are queued behind each other.
    /// `Err` is returned only for node connectivity, RPC and signing
    /// failures; everything else is a `SubmissionOutcome`.
    pub async fn submit(&self, call: &EncodedCall, signer: &Wallet) -> RelayResult<SubmissionOutcome> {
        let _lane = self.lanes.acquire(signer.address()).await;
        let outcome = self.run(call, signer).await?;
        metrics::record_submission_outcome(outcome.label());
        Ok(outcome)
    }

    async fn run(&self, call: &EncodedCall, signer: &Wallet) -> RelayResult<SubmissionOutcome> {
        let id = Uuid::new_v4();
        let address = signer.address();
        let request = call.request_from(address);

        // Preflight
        if let Err(err) = self.ledger.simulate(&request).await {
            return match err {
                CallError::Reverted(reason) => {
                    tracing::warn!(submission = %id, call = call.label, signer = %address, reason = %reason, "Preflight predicts revert, not broadcasting");
                    Ok(SubmissionOutcome::WouldRevert { reason })
                }
                CallError::Ledger(e) => Err(e.into()),
            };
        }

        // Estimating
        let estimate = match self.ledger.estimate_gas(&request).await {
            Ok(gas) => gas,
            Err(CallError::Reverted(reason)) => {
                tracing::warn!(submission = %id, call = call.label, reason = %reason, "Gas estimation reverted");
                return Ok(SubmissionOutcome::WouldRevert { reason });
            }
            Err(CallError::Ledger(e)) => return Err(e.into()),
        };

        let mut pending = PendingSubmission {
            id,
            signer: address,
            nonce: self.ledger.pending_nonce(address).await?,
            gas_limit: estimate.saturating_add(self.policy.gas_margin),
            base_fee: 0,
            tip: u128::from(self.policy.priority_fee_floor_wei),
            attempts: 0,
            last_tx_hash: None,
            sent: Vec::new(),
        };

        tracing::debug!(
            submission = %id,
            call = call.label,
            signer = %address,
            nonce = pending.nonce,
            gas_limit = pending.gas_limit,
            "Submission started"
        );

        let fee_cap = u128::from(self.policy.max_fee_cap_gwei).saturating_mul(WEI_PER_GWEI);

        while pending.attempts < self.policy.max_attempts {
            if pending.attempts > 0 {
                sleep(calculate_backoff(
                    pending.attempts,
                    self.policy.retry_base_delay_ms,
                    self.policy.retry_max_delay_ms,
                ))
                .await;
            }

            // Building
            pending.base_fee = self.ledger.latest_block().await?.base_fee;
            let max_fee = max_fee_per_gas(pending.base_fee, pending.tip, self.policy.base_fee_multiplier);
            if max_fee > fee_cap {
                tracing::warn!(submission = %id, max_fee, fee_cap, "Max fee exceeds cap");
                return Ok(pending.failed(format!(
                    "max fee {} wei exceeds cap of {} gwei",
                    max_fee, self.policy.max_fee_cap_gwei
                )));
            }

            let tx = TransactionRequest::default()
                .with_to(call.to)
                .with_value(call.value)
                .with_input(call.input.clone())
                .with_nonce(pending.nonce)
                .with_gas_limit(pending.gas_limit)
                .with_max_fee_per_gas(max_fee)
                .with_max_priority_fee_per_gas(pending.tip);

            // Signing
            let signed = signer.sign_transaction(tx).await?;
            let signed_hash = signed.hash;
            pending.attempts += 1;
            pending.last_tx_hash = Some(signed_hash);
            pending.sent.push(signed_hash);

            // Broadcasting
            let rejection = match self.ledger.broadcast(signed.raw).await {
                Ok(tx_hash) => {
                    metrics::record_broadcast("accepted");
                    tracing::info!(
                        submission = %id,
                        call = call.label,
                        tx_hash = %tx_hash,
                        nonce = pending.nonce,
                        tip = pending.tip,
                        attempt = pending.attempts,
                        "Transaction broadcast"
                    );
                    pending.last_tx_hash = Some(tx_hash);
                    return self.confirm(&pending, tx_hash).await;
                }
                Err(rejection) => rejection,
            };

            match self.find_sent(&pending).await {
                Ok(Some(known)) => {
                    metrics::record_broadcast("already_known");
                    tracing::warn!(
                        submission = %id,
                        call = call.label,
                        tx_hash = %known,
                        rejection = %rejection,
                        "Node already holds a payload from this submission, waiting on it"
                    );
                    pending.last_tx_hash = Some(known);
                    return self.confirm(&pending, known).await;
                }
                Ok(None) => {}
                Err(e) => return Ok(self.unresolved(&pending, signed_hash, e)),
            }

            match rejection {
                BroadcastError::Underpriced(reason) => {
                    metrics::record_broadcast("underpriced");
                    let previous = pending.tip;
                    pending.bump_tip();
                    tracing::warn!(submission = %id, reason = %reason, previous_tip = previous, tip = pending.tip, "Broadcast underpriced, bumping tip");
                }
                BroadcastError::NonceConflict(reason) => {
                    metrics::record_broadcast("nonce_conflict");
                    let fresh = self.ledger.pending_nonce(address).await?;
                    if fresh != pending.nonce {
                        metrics::record_nonce_resync();
                        tracing::warn!(submission = %id, reason = %reason, stale = pending.nonce, nonce = fresh, "Nonce conflict, resyncing");
                        pending.nonce = fresh;
                    } else {
                        // Nonce still ours, so a competing replacement holds it.
                        pending.bump_tip();
                        tracing::warn!(submission = %id, reason = %reason, nonce = fresh, tip = pending.tip, "Nonce conflict at unchanged nonce, bumping tip");
                    }
                }
                BroadcastError::Other(reason) => {
                    metrics::record_broadcast("rejected");
                    tracing::error!(submission = %id, call = call.label, reason = %reason, "Broadcast rejected");
                    return Ok(pending.failed(reason));
                }
                BroadcastError::Ledger(e) => {
                    metrics::record_broadcast("error");
                    return Err(e.into());
                }
            }
        }

        tracing::error!(
            submission = %id,
            call = call.label,
            attempts = pending.attempts,
            last_tx_hash = ?pending.last_tx_hash,
            "Attempt budget exhausted"
        );
        Ok(pending.failed(format!(
            "no broadcast accepted after {} attempts",
            pending.attempts
        )))
    }

    /// Payload of this submission that the node already holds, newest first.
    async fn find_sent(&self, pending: &PendingSubmission) -> Result<Option<TxHash>, LedgerError> {
        for &hash in pending.sent.iter().rev() {
            if self.ledger.transaction_known(hash).await? {
                return Ok(Some(hash));
            }
        }
        Ok(None)
    }

    /// Contact was lost while `tx_hash` may be in a node's pool.
    fn unresolved(&self, pending: &PendingSubmission, tx_hash: TxHash, err: LedgerError) -> SubmissionOutcome {
        tracing::error!(
            submission = %pending.id,
            tx_hash = %tx_hash,
            error = %err,
            "Cannot tell whether the broadcast landed"
        );
        SubmissionOutcome::Timeout { tx_hash }
    }

    /// Wait for the receipt of an accepted broadcast.
    ///
    /// Failed receipt lookups are retried until the deadline, so a broadcast
    /// that was accepted always ends with its hash in the outcome.
    async fn confirm(&self, pending: &PendingSubmission, tx_hash: TxHash) -> RelayResult<SubmissionOutcome> {
        let started = Instant::now();
        let poll_interval = Duration::from_millis(self.policy.receipt_poll_interval_ms);
        let deadline = Duration::from_secs(self.policy.confirmation_timeout_secs);

        let result = timeout(deadline, async {
            let mut ticker = interval(poll_interval);
            loop {
                ticker.tick().await;
                match self.ledger.receipt(tx_hash).await {
                    Ok(Some(receipt)) => return receipt,
                    Ok(None) => tracing::debug!(submission = %pending.id, tx_hash = %tx_hash, "Transaction pending"),
                    Err(e) => tracing::warn!(submission = %pending.id, tx_hash = %tx_hash, error = %e, "Receipt lookup failed"),
                }
            }
        })
        .await;

        match result {
            Ok(receipt) => {
                metrics::record_confirmation_time(started.elapsed());
                if !receipt.success {
                    tracing::error!(
                        submission = %pending.id,
                        tx_hash = %tx_hash,
                        block_number = receipt.block_number,
                        "Transaction reverted on-chain"
                    );
                    return Ok(SubmissionOutcome::Reverted {
                        tx_hash,
                        block_number: receipt.block_number,
                    });
                }
                tracing::info!(
                    submission = %pending.id,
                    signer = %pending.signer,
                    tx_hash = %tx_hash,
                    block_number = receipt.block_number,
                    gas_used = receipt.gas_used,
                    "Transaction confirmed"
                );
                Ok(SubmissionOutcome::Confirmed(ConfirmedTx {
                    tx_hash,
                    block_number: receipt.block_number,
                    gas_used: receipt.gas_used,
                    logs: receipt.logs,
                }))
            }
            Err(_) => {
                tracing::warn!(
                    submission = %pending.id,
                    tx_hash = %tx_hash,
                    timeout_secs = self.policy.confirmation_timeout_secs,
                    "Confirmation deadline passed"
                );
                Ok(SubmissionOutcome::Timeout { tx_hash })
            }
        }
    }
}
