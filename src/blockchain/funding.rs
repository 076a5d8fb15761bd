//! Keeps derived accounts able to pay for their own transactions.
//!
//! Before a derived account submits anything, its balance is compared with
//! the configured minimum. If it is short, the controller sends exactly the
//! shortfall and waits for that transfer to confirm.
//!
//! Checks for the same account are queued, so concurrent operations for one
//! identity see the first top-up instead of each sending their own.

use alloy::primitives::{Address, TxHash, U256};
use std::sync::Arc;

use crate::blockchain::client::LedgerClient;
use crate::blockchain::lanes::SignerLanes;
use crate::blockchain::transaction::TransactionSubmitter;
use crate::blockchain::types::{EncodedCall, SubmissionOutcome};
use crate::blockchain::wallet::Wallet;
use crate::error::{RelayError, RelayResult};
use crate::observability::metrics;

pub struct FundingGuard {
    ledger: Arc<dyn LedgerClient>,
    submitter: Arc<TransactionSubmitter>,
    controller: Wallet,
    accounts: SignerLanes,
}

impl FundingGuard {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        submitter: Arc<TransactionSubmitter>,
        controller: Wallet,
    ) -> Self {
        Self {
            ledger,
            submitter,
            controller,
            accounts: SignerLanes::new(),
        }
    }

    /// Address that pays for top-ups.
    pub fn controller_address(&self) -> Address {
        self.controller.address()
    }

    /// Make sure `account` holds at least `min_balance`.
    ///
    /// Returns the hash of the top-up transfer, or `None` if the account was
    /// already funded.
    pub async fn ensure_funded(
        &self,
        account: Address,
        min_balance: U256,
    ) -> RelayResult<Option<TxHash>> {
        let _account = self.accounts.acquire(account).await;
        let balance = self.ledger.balance(account).await?;
        if balance >= min_balance {
            tracing::debug!(account = %account, balance = %balance, "Account funded");
            return Ok(None);
        }

        let shortfall = min_balance - balance;
        tracing::info!(
            account = %account,
            balance = %balance,
            min_balance = %min_balance,
            shortfall = %shortfall,
            controller = %self.controller.address(),
            "Topping up account"
        );

        let transfer = EncodedCall::transfer(account, shortfall);
        let tx = match self.submitter.submit(&transfer, &self.controller).await? {
            SubmissionOutcome::Confirmed(tx) => tx,
            outcome => {
                metrics::record_top_up("failed");
                tracing::error!(account = %account, outcome = %outcome, "Top-up did not confirm");
                return Err(RelayError::FundingFailed(outcome.to_string()));
            }
        };

        let balance = self.ledger.balance(account).await?;
        if balance < min_balance {
            metrics::record_top_up("failed");
            return Err(RelayError::FundingFailed(format!(
                "balance {} still below minimum {} after top-up {}",
                balance, min_balance, tx.tx_hash
            )));
        }

        metrics::record_top_up("confirmed");
        tracing::info!(account = %account, tx_hash = %tx.tx_hash, balance = %balance, "Account topped up");
        Ok(Some(tx.tx_hash))
    }
}
