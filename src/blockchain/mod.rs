//! Blockchain integration subsystem.
//!
//! # Data Flow
//! ```text
//! identity + secret
//!     → derivation.rs (deterministic keypair)
//!     → funding.rs (controller tops up short balances)
//!     → transaction.rs (preflight, fee/nonce retries, confirmation)
//!     → client.rs (RPC with timeouts and failover)
//! ```
//!
//! # Security Constraints
//! - Secrets ONLY from environment variables
//! - Never log private keys or the derivation secret
//! - All RPC calls have configurable timeouts

pub mod client;
pub mod derivation;
pub mod funding;
pub mod lanes;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::{AlloyLedger, LedgerClient};
pub use derivation::{derive, DerivationSecret, DerivedAccount};
pub use funding::FundingGuard;
pub use lanes::SignerLanes;
pub use transaction::TransactionSubmitter;
pub use types::{
    BlockchainConfig, ChainId, ConfirmedTx, EncodedCall, LedgerError, SubmissionConfig,
    SubmissionOutcome,
};
pub use wallet::Wallet;
