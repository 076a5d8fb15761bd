//! Startup orchestration.
//!
//! Everything the relay needs is checked before the first operation runs:
//! secrets, the controller key, the contract address, node reachability
//! and the chain id. Any failure is fatal.

use alloy::primitives::Address;
use std::sync::Arc;

use crate::blockchain::client::AlloyLedger;
use crate::blockchain::derivation::DerivationSecret;
use crate::blockchain::wallet::Wallet;
use crate::config::schema::RelayConfig;
use crate::error::{RelayError, RelayResult};
use crate::voting::service::VotingService;

/// Parse the configured contract address.
pub fn contract_address(config: &RelayConfig) -> RelayResult<Address> {
    config.contract.address.parse().map_err(|e| {
        RelayError::Config(format!(
            "invalid contract address '{}': {}",
            config.contract.address, e
        ))
    })
}

/// Build a connected service from validated configuration and the
/// environment.
pub async fn bootstrap(config: &RelayConfig) -> RelayResult<VotingService> {
    let secret = DerivationSecret::from_env()?;
    let controller = Wallet::from_env(config.blockchain.chain_id)?;
    let contract = contract_address(config)?;

    let ledger = AlloyLedger::connect(config.blockchain.clone()).await?;

    tracing::info!(
        contract = %contract,
        controller = %controller.address(),
        chain_id = config.blockchain.chain_id,
        min_balance_gwei = config.funding.min_balance_gwei,
        "Relay ready"
    );

    Ok(VotingService::new(
        Arc::new(ledger),
        contract,
        controller,
        secret,
        config.submission.clone(),
        config.funding.min_balance(),
    ))
}
