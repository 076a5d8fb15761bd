//! Ledger RPC access with timeout and error handling.
//!
//! # Responsibilities
//! - Define the `LedgerClient` capability the relay core is written against
//! - Connect to JSON-RPC endpoints (primary + failovers) via alloy
//! - Classify node rejections of broadcasts into structured errors
//! - Handle timeouts and network errors gracefully

use alloy::eips::BlockNumberOrTag;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::transports::TransportResult;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use crate::blockchain::types::{
    BlockInfo, BlockchainConfig, BroadcastError, CallError, CallRequest, ChainId, LedgerError,
    LedgerResult, ReceiptInfo,
};
use crate::observability::metrics;

/// Node capabilities consumed by the relay core.
///
/// Implementations must not retry node-level rejections on their own; the
/// submitter owns retry policy.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Chain ID reported by the node.
    async fn chain_id(&self) -> LedgerResult<u64>;

    /// Native balance of an address.
    async fn balance(&self, address: Address) -> LedgerResult<U256>;

    /// Transaction count of an address including pending transactions.
    async fn pending_nonce(&self, address: Address) -> LedgerResult<u64>;

    /// Number, timestamp and base fee of the latest block.
    async fn latest_block(&self) -> LedgerResult<BlockInfo>;

    /// Gas estimate for a call.
    async fn estimate_gas(&self, call: &CallRequest) -> Result<u64, CallError>;

    /// Read-only execution of a call against current state.
    async fn simulate(&self, call: &CallRequest) -> Result<Bytes, CallError>;

    /// Broadcast a signed, EIP-2718 encoded transaction.
    async fn broadcast(&self, raw: Bytes) -> Result<TxHash, BroadcastError>;

    /// Receipt for a transaction, if it has been mined.
    async fn receipt(&self, tx_hash: TxHash) -> LedgerResult<Option<ReceiptInfo>>;

    /// Whether the node holds `tx_hash`, either pending or mined.
    async fn transaction_known(&self, tx_hash: TxHash) -> LedgerResult<bool> {
        Ok(self.receipt(tx_hash).await?.is_some())
    }
}

/// Map a node's broadcast rejection message onto a retry class.
///
/// Nodes only report these conditions as free text, so matching is confined
/// to this function.
pub fn classify_broadcast_error(message: &str) -> BroadcastError {
    let lower = message.to_lowercase();
    const UNDERPRICED: &[&str] = &[
        "underpriced",
        "fee too low",
        "max fee per gas less than block base fee",
        "gas price too low",
    ];
    const NONCE_CONFLICT: &[&str] = &[
        "nonce too low",
        "already known",
        "known transaction",
        "nonce has already been used",
    ];

    if UNDERPRICED.iter().any(|needle| lower.contains(needle)) {
        BroadcastError::Underpriced(message.to_string())
    } else if NONCE_CONFLICT.iter().any(|needle| lower.contains(needle)) {
        BroadcastError::NonceConflict(message.to_string())
    } else {
        BroadcastError::Other(message.to_string())
    }
}

/// Why a request to the provider set failed.
enum NodeFailure {
    /// The node answered with a JSON-RPC error.
    Rejected(String),
    /// The node answered with something we could not parse.
    Malformed(String),
    /// No provider answered.
    Unreachable(LedgerError),
}

impl From<NodeFailure> for LedgerError {
    fn from(failure: NodeFailure) -> Self {
        match failure {
            NodeFailure::Rejected(msg) | NodeFailure::Malformed(msg) => LedgerError::Rpc(msg),
            NodeFailure::Unreachable(err) => err,
        }
    }
}

impl From<NodeFailure> for CallError {
    fn from(failure: NodeFailure) -> Self {
        match failure {
            NodeFailure::Rejected(msg) => CallError::Reverted(msg),
            other => CallError::Ledger(other.into()),
        }
    }
}

/// alloy-backed ledger client with failover support.
#[derive(Clone)]
pub struct AlloyLedger {
    /// List of providers (primary + failovers).
    providers: Vec<DynProvider>,
    /// Configuration.
    config: BlockchainConfig,
    /// Request timeout duration.
    timeout_duration: Duration,
}

impl AlloyLedger {
    /// Create a client without touching the network.
    pub fn new(config: BlockchainConfig) -> LedgerResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);
        let mut providers = Vec::new();

        let primary_url: url::Url = config.rpc_url.parse().map_err(|e| {
            LedgerError::Connection(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        providers.push(ProviderBuilder::new().connect_http(primary_url).erased());

        for url_str in &config.failover_urls {
            match url_str.parse::<url::Url>() {
                Ok(url) => providers.push(ProviderBuilder::new().connect_http(url).erased()),
                Err(_) => tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL"),
            }
        }

        Ok(Self {
            providers,
            config,
            timeout_duration,
        })
    }

    /// Create a client and verify the node is reachable on the expected chain.
    pub async fn connect(config: BlockchainConfig) -> LedgerResult<Self> {
        let client = Self::new(config)?;
        client.verify_chain_id().await?;
        tracing::info!(
            rpc_url = %client.config.rpc_url,
            chain_id = client.config.chain_id,
            failovers = client.providers.len() - 1,
            "Ledger client connected"
        );
        Ok(client)
    }

    /// Verify the connected chain ID matches configuration.
    pub async fn verify_chain_id(&self) -> LedgerResult<()> {
        let chain_id = ChainId(self.chain_id().await?);
        if chain_id.0 != self.config.chain_id {
            return Err(LedgerError::ChainMismatch {
                expected: self.config.chain_id,
                actual: chain_id.0,
            });
        }
        Ok(())
    }

    /// Get the configuration.
    pub fn config(&self) -> &BlockchainConfig {
        &self.config
    }

    /// Run a request against each provider in turn until one answers.
    ///
    /// A JSON-RPC error response is an answer and is returned immediately;
    /// only transport failures and timeouts move on to the next provider.
    async fn request<T, F, Fut>(&self, op: &'static str, f: F) -> Result<T, NodeFailure>
    where
        T: Send,
        F: Fn(DynProvider) -> Fut + Send + Sync,
        Fut: Future<Output = TransportResult<T>> + Send,
    {
        let mut timed_out = false;
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, f(provider.clone())).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => {
                    if let Some(payload) = e.as_error_resp() {
                        return Err(NodeFailure::Rejected(payload.message.to_string()));
                    }
                    if e.is_deser_error() || e.is_null_resp() {
                        metrics::record_rpc_error(op);
                        return Err(NodeFailure::Malformed(format!("{}: {}", op, e)));
                    }
                    tracing::warn!(provider_idx = i, op, error = %e, "RPC error, trying next provider");
                }
                Err(_) => {
                    timed_out = true;
                    tracing::warn!(provider_idx = i, op, "RPC timeout, trying next provider");
                }
            }
        }
        metrics::record_rpc_error(op);
        if timed_out && self.providers.len() == 1 {
            return Err(NodeFailure::Unreachable(LedgerError::Timeout(
                self.config.rpc_timeout_secs,
            )));
        }
        Err(NodeFailure::Unreachable(LedgerError::Connection(format!(
            "All RPC providers failed to {}",
            op
        ))))
    }
}

fn to_transaction_request(call: &CallRequest) -> TransactionRequest {
    let mut tx = TransactionRequest::default()
        .with_to(call.to)
        .with_value(call.value)
        .with_input(call.input.clone());
    if let Some(from) = call.from {
        tx = tx.with_from(from);
    }
    tx
}

#[async_trait]
impl LedgerClient for AlloyLedger {
    async fn chain_id(&self) -> LedgerResult<u64> {
        Ok(self
            .request("get chain id", |p| async move { p.get_chain_id().await })
            .await?)
    }

    async fn balance(&self, address: Address) -> LedgerResult<U256> {
        Ok(self
            .request("get balance", move |p| async move {
                p.get_balance(address).await
            })
            .await?)
    }

    async fn pending_nonce(&self, address: Address) -> LedgerResult<u64> {
        Ok(self
            .request("get transaction count", move |p| async move {
                p.get_transaction_count(address).pending().await
            })
            .await?)
    }

    async fn latest_block(&self) -> LedgerResult<BlockInfo> {
        let block = self
            .request("get latest block", |p| async move {
                p.get_block_by_number(BlockNumberOrTag::Latest).await
            })
            .await?
            .ok_or_else(|| LedgerError::Rpc("latest block not available".to_string()))?;

        Ok(BlockInfo {
            number: block.header.number,
            timestamp: block.header.timestamp,
            base_fee: block.header.base_fee_per_gas.map(u128::from).unwrap_or_default(),
        })
    }

    async fn estimate_gas(&self, call: &CallRequest) -> Result<u64, CallError> {
        let tx = to_transaction_request(call);
        Ok(self
            .request("estimate gas", move |p| {
                let tx = tx.clone();
                async move { p.estimate_gas(tx).await }
            })
            .await?)
    }

    async fn simulate(&self, call: &CallRequest) -> Result<Bytes, CallError> {
        let tx = to_transaction_request(call);
        Ok(self
            .request("call", move |p| {
                let tx = tx.clone();
                async move { p.call(tx).await }
            })
            .await?)
    }

    async fn broadcast(&self, raw: Bytes) -> Result<TxHash, BroadcastError> {
        // Resending the same signed payload to a failover node is safe: nodes
        // deduplicate by hash.
        let result = self
            .request("send raw transaction", move |p| {
                let raw = raw.clone();
                async move {
                    p.send_raw_transaction(&raw)
                        .await
                        .map(|pending| *pending.tx_hash())
                }
            })
            .await;

        match result {
            Ok(hash) => Ok(hash),
            Err(NodeFailure::Rejected(msg)) => Err(classify_broadcast_error(&msg)),
            Err(other) => Err(BroadcastError::Ledger(other.into())),
        }
    }

    async fn receipt(&self, tx_hash: TxHash) -> LedgerResult<Option<ReceiptInfo>> {
        let receipt = self
            .request("get receipt", move |p| async move {
                p.get_transaction_receipt(tx_hash).await
            })
            .await?;

        Ok(receipt.map(|r| ReceiptInfo {
            tx_hash: r.transaction_hash,
            block_number: r.block_number.unwrap_or_default(),
            success: r.status(),
            gas_used: r.gas_used,
            logs: r.logs().iter().map(|log| log.inner.clone()).collect(),
        }))
    }

    async fn transaction_known(&self, tx_hash: TxHash) -> LedgerResult<bool> {
        let tx = self
            .request("get transaction", move |p| async move {
                p.get_transaction_by_hash(tx_hash).await
            })
            .await?;
        Ok(tx.is_some())
    }
}

impl std::fmt::Debug for AlloyLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlloyLedger")
            .field("rpc_url", &self.config.rpc_url)
            .field("chain_id", &self.config.chain_id)
            .field("providers", &self.providers.len())
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}
