//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Rejected broadcast:
//!     → backoff.rs (wait before the next attempt)
//!     → submitter refreshes base fee / nonce and retries
//! ```
//!
//! RPC deadlines and failover live in the ledger client.

pub mod backoff;
