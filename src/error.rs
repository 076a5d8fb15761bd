//! Crate-wide error taxonomy.
//!
//! Every failure that crosses the relay boundary is one of these variants.
//! Transient broadcast conditions (underpriced, nonce conflicts) never show
//! up here; the submitter absorbs them until its attempt budget runs out.

use alloy::primitives::TxHash;
use thiserror::Error;

use crate::blockchain::types::LedgerError;
use crate::voting::validation::PayloadError;

/// Errors surfaced by relay operations.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The external identity was empty.
    #[error("identity must not be empty")]
    InvalidIdentity,

    /// The derived digest did not map to a usable private key.
    #[error("key derivation produced an invalid private scalar")]
    DerivationFailed,

    /// The call payload is outside the contract's bounds.
    #[error("invalid payload: {0}")]
    Validation(#[from] PayloadError),

    /// Preflight simulation predicted a revert; nothing was broadcast.
    #[error("call would revert: {0}")]
    WouldRevert(String),

    /// The transaction was mined but executed with failure status.
    #[error("transaction {tx_hash} reverted on-chain")]
    Reverted { tx_hash: TxHash },

    /// Broadcast was rejected for good or the attempt budget ran out.
    #[error("submission failed after {attempts} attempt(s): {reason}")]
    Failed {
        reason: String,
        last_tx_hash: Option<TxHash>,
        attempts: u32,
    },

    /// The transaction was broadcast but no receipt arrived before the deadline.
    #[error("transaction {tx_hash} not confirmed before the deadline")]
    Timeout { tx_hash: TxHash },

    /// The node could not be reached.
    #[error("connection failure: {0}")]
    Connection(String),

    /// The node answered with an error or an unparsable payload.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Topping up a derived account did not succeed.
    #[error("funding failed: {0}")]
    FundingFailed(String),

    /// A read query returned data of the wrong shape.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Key parsing or transaction signing failed.
    #[error("wallet error: {0}")]
    Wallet(String),

    /// Startup configuration is missing or inconsistent.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<LedgerError> for RelayError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Connection(msg) => RelayError::Connection(msg),
            LedgerError::Timeout(secs) => {
                RelayError::Connection(format!("RPC timeout after {} seconds", secs))
            }
            LedgerError::Rpc(msg) => RelayError::Rpc(msg),
            err @ LedgerError::ChainMismatch { .. } => RelayError::Config(err.to_string()),
        }
    }
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
