//! Poll operations on behalf of end-user identities.
//!
//! Poll administration (create, cancel, reschedule) is signed and paid for
//! by the controller. Votes are signed by the voter's derived account, which
//! the controller tops up first when it runs low.

use alloy::primitives::{Address, Bytes, TxHash, U256};
use std::sync::Arc;

use crate::blockchain::client::LedgerClient;
use crate::blockchain::derivation::{derive, DerivationSecret};
use crate::blockchain::funding::FundingGuard;
use crate::blockchain::transaction::TransactionSubmitter;
use crate::blockchain::types::{CallError, EncodedCall, SubmissionConfig};
use crate::blockchain::wallet::Wallet;
use crate::error::{RelayError, RelayResult};
use crate::voting::contract::ContractGateway;
use crate::voting::types::{CallIntent, PollCreation, PollInfo, PollRef};

pub struct VotingService {
    ledger: Arc<dyn LedgerClient>,
    gateway: ContractGateway,
    submitter: Arc<TransactionSubmitter>,
    funding: FundingGuard,
    controller: Wallet,
    secret: DerivationSecret,
    min_balance: U256,
}

impl VotingService {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        contract: Address,
        controller: Wallet,
        secret: DerivationSecret,
        submission: SubmissionConfig,
        min_balance: U256,
    ) -> Self {
        let submitter = Arc::new(TransactionSubmitter::new(ledger.clone(), submission));
        let funding = FundingGuard::new(ledger.clone(), submitter.clone(), controller.clone());
        Self {
            ledger,
            gateway: ContractGateway::new(contract),
            submitter,
            funding,
            controller,
            secret,
            min_balance,
        }
    }

    pub fn gateway(&self) -> &ContractGateway {
        &self.gateway
    }

    pub fn controller_address(&self) -> Address {
        self.controller.address()
    }

    /// Address `identity` votes from.
    pub fn account_address(&self, identity: &str) -> RelayResult<Address> {
        Ok(derive(&self.secret, identity)?.address())
    }

    /// Create a poll from the controller account.
    pub async fn create_poll(
        &self,
        question: String,
        answers: Vec<String>,
        multiple_choice: bool,
        start_time: u64,
        duration: u64,
    ) -> RelayResult<PollCreation> {
        let call = self.gateway.encode(&CallIntent::CreatePoll {
            question,
            answers,
            multiple_choice,
            start_time,
            duration,
        })?;

        let tx = self.submitter.submit(&call, &self.controller).await?.into_confirmed()?;

        let poll_id = match self.gateway.poll_id_from_logs(&tx.logs)? {
            Some(id) => id,
            None => {
                tracing::warn!(tx_hash = %tx.tx_hash, "No creation event in receipt, falling back to nextPollID");
                self.next_poll_id().await?.checked_sub(1).ok_or_else(|| {
                    RelayError::MalformedResponse("nextPollID is zero after creation".to_string())
                })?
            }
        };

        tracing::info!(tx_hash = %tx.tx_hash, poll_id, "Poll created");
        Ok(PollCreation {
            tx_hash: tx.tx_hash,
            poll_id,
        })
    }

    /// Cast `identity`'s vote.
    ///
    /// The payload is checked before any network access; the voter's account
    /// is derived and funded only once the vote is known to be well-formed.
    pub async fn vote(&self, identity: &str, poll_id: u64, answer_ids: Vec<u32>) -> RelayResult<TxHash> {
        let call = self.gateway.encode(&CallIntent::Vote {
            poll_id,
            answer_ids,
        })?;

        let account = derive(&self.secret, identity)?;
        let voter = account.address();
        self.funding.ensure_funded(voter, self.min_balance).await?;

        let wallet = account.into_wallet(self.controller.chain_id());
        let tx = self.submitter.submit(&call, &wallet).await?.into_confirmed()?;

        tracing::info!(poll_id, voter = %voter, tx_hash = %tx.tx_hash, "Vote recorded");
        Ok(tx.tx_hash)
    }

    pub async fn cancel_poll(&self, poll_id: u64) -> RelayResult<TxHash> {
        let call = self.gateway.encode(&CallIntent::CancelPoll { poll_id })?;
        let tx = self.submitter.submit(&call, &self.controller).await?.into_confirmed()?;
        tracing::info!(poll_id, tx_hash = %tx.tx_hash, "Poll canceled");
        Ok(tx.tx_hash)
    }

    pub async fn reschedule(&self, poll_id: u64, start_time: u64, duration: u64) -> RelayResult<TxHash> {
        let call = self.gateway.encode(&CallIntent::RescheduleVoting {
            poll_id,
            start_time,
            duration,
        })?;
        let tx = self.submitter.submit(&call, &self.controller).await?.into_confirmed()?;
        tracing::info!(poll_id, start_time, duration, tx_hash = %tx.tx_hash, "Poll rescheduled");
        Ok(tx.tx_hash)
    }

    pub async fn poll_info(&self, poll_id: u64) -> RelayResult<PollInfo> {
        let raw = self.query(&self.gateway.poll_info_query(poll_id)).await?;
        self.gateway.decode_poll_info(&raw)
    }

    /// Vote counts, one per answer, in answer order.
    pub async fn results(&self, poll_id: u64) -> RelayResult<Vec<u64>> {
        let info = self.poll_info(poll_id).await?;
        self.results_for(poll_id, &info).await
    }

    /// Vote counts checked against an already fetched poll record.
    pub async fn results_for(&self, poll_id: u64, info: &PollInfo) -> RelayResult<Vec<u64>> {
        let raw = self.query(&self.gateway.results_query(poll_id)).await?;
        self.gateway.decode_results(&raw, info.answers.len())
    }

    /// Answers `identity` selected in a poll.
    pub async fn user_votes(&self, poll_id: u64, identity: &str) -> RelayResult<Vec<u32>> {
        let voter = self.account_address(identity)?;
        self.user_votes_of(poll_id, voter).await
    }

    pub async fn user_votes_of(&self, poll_id: u64, voter: Address) -> RelayResult<Vec<u32>> {
        let raw = self.query(&self.gateway.user_votes_query(poll_id, voter)).await?;
        self.gateway.decode_user_votes(&raw)
    }

    pub async fn active_polls(&self) -> RelayResult<Vec<u64>> {
        let raw = self.query(&self.gateway.active_polls_query()).await?;
        self.gateway.decode_poll_ids(&raw)
    }

    pub async fn next_poll_id(&self) -> RelayResult<u64> {
        let raw = self.query(&self.gateway.next_poll_id_query()).await?;
        self.gateway.decode_next_poll_id(&raw)
    }

    /// Turn a poll reference into a poll id, reading the creation receipt
    /// when given a transaction hash.
    pub async fn resolve_poll_id(&self, poll: PollRef) -> RelayResult<u64> {
        let tx_hash = match poll {
            PollRef::Id(id) => return Ok(id),
            PollRef::CreationTx(hash) => hash,
        };

        let receipt = self
            .ledger
            .receipt(tx_hash)
            .await?
            .ok_or_else(|| RelayError::Rpc(format!("no receipt for transaction {}", tx_hash)))?;
        if !receipt.success {
            return Err(RelayError::Reverted { tx_hash });
        }

        self.gateway.poll_id_from_logs(&receipt.logs)?.ok_or_else(|| {
            RelayError::MalformedResponse(format!(
                "transaction {} did not create a poll on {}",
                tx_hash,
                self.gateway.address()
            ))
        })
    }

    /// Timestamp of the latest block, used as "now" for poll status.
    pub async fn chain_time(&self) -> RelayResult<u64> {
        Ok(self.ledger.latest_block().await?.timestamp)
    }

    async fn query(&self, call: &EncodedCall) -> RelayResult<Bytes> {
        match self.ledger.simulate(&call.query()).await {
            Ok(raw) => Ok(raw),
            Err(CallError::Reverted(reason)) => {
                tracing::debug!(call = call.label, reason = %reason, "Query reverted");
                Err(RelayError::WouldRevert(reason))
            }
            Err(CallError::Ledger(e)) => Err(e.into()),
        }
    }
}
