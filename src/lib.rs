//! Poll relay library.
//!
//! Submits poll administration and vote transactions to an EVM voting
//! contract on behalf of chat identities, each backed by a key derived
//! deterministically from a shared secret.

pub mod blockchain;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod voting;

pub use config::schema::RelayConfig;
pub use error::{RelayError, RelayResult};
pub use voting::VotingService;
