//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → Load secrets → Connect → Verify chain id
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Secrets are read once and passed down, never re-read

pub mod startup;

pub use startup::bootstrap;
