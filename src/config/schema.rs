//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use alloy::primitives::U256;
use serde::{Deserialize, Serialize};

/// Root configuration for the poll relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Node connection settings.
    pub blockchain: BlockchainConfig,

    /// The voting contract.
    pub contract: ContractConfig,

    /// Transaction submission policy.
    pub submission: SubmissionConfig,

    /// Derived-account funding policy.
    pub funding: FundingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Blockchain node settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BlockchainConfig {
    /// JSON-RPC endpoint URL.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    pub failover_urls: Vec<String>,

    /// Chain ID (e.g., 11155111 for Sepolia, 31337 for local Anvil).
    pub chain_id: u64,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 31337,
            rpc_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ContractConfig {
    /// Address of the voting contract (0x-prefixed hex).
    pub address: String,
}

/// Retry and fee policy for transaction submission.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SubmissionConfig {
    /// Maximum broadcasts per submission.
    pub max_attempts: u32,

    /// Gas added on top of the node's estimate.
    pub gas_margin: u64,

    /// Starting priority fee in wei.
    pub priority_fee_floor_wei: u64,

    /// Max fee = base fee * multiplier + tip.
    pub base_fee_multiplier: u64,

    /// Hard ceiling on max fee per gas, in gwei.
    pub max_fee_cap_gwei: u64,

    /// Receipt polling interval in milliseconds.
    pub receipt_poll_interval_ms: u64,

    /// How long to wait for a receipt after a broadcast is accepted.
    pub confirmation_timeout_secs: u64,

    /// Base delay between broadcast attempts in milliseconds.
    pub retry_base_delay_ms: u64,

    /// Maximum delay between broadcast attempts in milliseconds.
    pub retry_max_delay_ms: u64,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            gas_margin: 50_000,
            priority_fee_floor_wei: 1_500_000_000,
            base_fee_multiplier: 2,
            max_fee_cap_gwei: 500,
            receipt_poll_interval_ms: 2_000,
            confirmation_timeout_secs: 180,
            retry_base_delay_ms: 200,
            retry_max_delay_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FundingConfig {
    /// Balance every derived account is topped up to, in gwei.
    pub min_balance_gwei: u64,
}

impl FundingConfig {
    /// Minimum balance in wei.
    pub fn min_balance(&self) -> U256 {
        U256::from(self.min_balance_gwei) * U256::from(1_000_000_000u64)
    }
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            // 0.001 ETH
            min_balance_gwei: 1_000_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Prometheus exporter bind address; no exporter when unset.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_address: None,
        }
    }
}
