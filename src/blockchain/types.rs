//! Chain-specific types and error definitions.

use alloy::primitives::{Address, Bytes, Log, TxHash, U256};
use std::fmt;
use thiserror::Error;

use crate::error::{RelayError, RelayResult};

// Re-export BlockchainConfig from config module to avoid duplication
pub use crate::config::schema::{BlockchainConfig, SubmissionConfig};

/// Chain ID type for strong typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChainId(pub u64);

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl From<ChainId> for u64 {
    fn from(id: ChainId) -> Self {
        id.0
    }
}

/// Errors raised by the node connection itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// No provider could be reached.
    #[error("connection failure: {0}")]
    Connection(String),

    /// The node answered with an error or a payload we could not parse.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("RPC timeout after {0} seconds")]
    Timeout(u64),

    /// Chain configuration mismatch.
    #[error("Chain ID mismatch: expected {expected}, got {actual}")]
    ChainMismatch { expected: u64, actual: u64 },
}

/// Result type for raw ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Failure of a read-only execution (simulation or gas estimation).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The node executed the call and it reverted.
    #[error("execution reverted: {0}")]
    Reverted(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Broadcast-time rejection, classified by the ledger adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BroadcastError {
    /// Fee too low for the pool or for replacing a pending transaction.
    #[error("transaction underpriced: {0}")]
    Underpriced(String),

    /// Nonce already used or payload already known.
    #[error("nonce conflict: {0}")]
    NonceConflict(String),

    /// Any other rejection by the node.
    #[error("broadcast rejected: {0}")]
    Other(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// A call executed against the ledger, with or without a sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Option<Address>,
    pub to: Address,
    pub value: U256,
    pub input: Bytes,
}

/// Head-of-chain values needed for fee computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub number: u64,
    pub timestamp: u64,
    /// Base fee per gas in wei (zero on pre-London chains).
    pub base_fee: u128,
}

/// The parts of a transaction receipt the relay cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptInfo {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub success: bool,
    pub gas_used: u64,
    pub logs: Vec<Log>,
}

/// A contract call (or plain transfer) ready to be handed to the submitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCall {
    pub to: Address,
    pub input: Bytes,
    pub value: U256,
    /// Short operation name used in logs and metrics.
    pub label: &'static str,
}

impl EncodedCall {
    /// A zero-value call with the given calldata.
    pub fn new(to: Address, input: Bytes, label: &'static str) -> Self {
        Self {
            to,
            input,
            value: U256::ZERO,
            label,
        }
    }

    /// A plain native-currency transfer.
    pub fn transfer(to: Address, value: U256) -> Self {
        Self {
            to,
            input: Bytes::new(),
            value,
            label: "transfer",
        }
    }

    /// The call as executed by `from`.
    pub fn request_from(&self, from: Address) -> CallRequest {
        CallRequest {
            from: Some(from),
            to: self.to,
            value: self.value,
            input: self.input.clone(),
        }
    }

    /// The call as an anonymous read-only query.
    pub fn query(&self) -> CallRequest {
        CallRequest {
            from: None,
            to: self.to,
            value: self.value,
            input: self.input.clone(),
        }
    }
}

/// A transaction that made it on-chain with success status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedTx {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub gas_used: u64,
    pub logs: Vec<Log>,
}

/// Terminal result of one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Included with success status.
    Confirmed(ConfirmedTx),
    /// Preflight predicted failure; nothing was broadcast.
    WouldRevert { reason: String },
    /// Included with failure status. Not retried.
    Reverted { tx_hash: TxHash, block_number: u64 },
    /// Rejected for good, fee cap hit, or attempts exhausted.
    Failed {
        reason: String,
        last_tx_hash: Option<TxHash>,
        attempts: u32,
    },
    /// Broadcast accepted but no receipt before the deadline.
    Timeout { tx_hash: TxHash },
}

impl SubmissionOutcome {
    /// Stable label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            SubmissionOutcome::Confirmed(_) => "confirmed",
            SubmissionOutcome::WouldRevert { .. } => "would_revert",
            SubmissionOutcome::Reverted { .. } => "reverted",
            SubmissionOutcome::Failed { .. } => "failed",
            SubmissionOutcome::Timeout { .. } => "timeout",
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, SubmissionOutcome::Confirmed(_))
    }

    /// Convert into the confirmed transaction, or the matching error.
    pub fn into_confirmed(self) -> RelayResult<ConfirmedTx> {
        match self {
            SubmissionOutcome::Confirmed(tx) => Ok(tx),
            SubmissionOutcome::WouldRevert { reason } => Err(RelayError::WouldRevert(reason)),
            SubmissionOutcome::Reverted { tx_hash, .. } => Err(RelayError::Reverted { tx_hash }),
            SubmissionOutcome::Failed {
                reason,
                last_tx_hash,
                attempts,
            } => Err(RelayError::Failed {
                reason,
                last_tx_hash,
                attempts,
            }),
            SubmissionOutcome::Timeout { tx_hash } => Err(RelayError::Timeout { tx_hash }),
        }
    }
}

impl fmt::Display for SubmissionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionOutcome::Confirmed(tx) => {
                write!(f, "confirmed {} in block {}", tx.tx_hash, tx.block_number)
            }
            SubmissionOutcome::WouldRevert { reason } => write!(f, "would revert: {}", reason),
            SubmissionOutcome::Reverted {
                tx_hash,
                block_number,
            } => write!(f, "{} reverted in block {}", tx_hash, block_number),
            SubmissionOutcome::Failed {
                reason,
                last_tx_hash,
                attempts,
            } => {
                write!(f, "failed after {} attempt(s): {}", attempts, reason)?;
                if let Some(hash) = last_tx_hash {
                    write!(f, " (last hash {})", hash)?;
                }
                Ok(())
            }
            SubmissionOutcome::Timeout { tx_hash } => {
                write!(f, "{} not confirmed before the deadline", tx_hash)
            }
        }
    }
}
