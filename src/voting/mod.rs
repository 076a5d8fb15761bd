//! Voting domain: poll calls, payload bounds and the service facade.
//!
//! # Data Flow
//! ```text
//! CallIntent
//!     → validation.rs (payload bounds)
//!     → contract.rs (ABI encoding)
//!     → service.rs (derive, fund, submit)
//!     → contract.rs (decode receipts and query results)
//! ```

pub mod contract;
pub mod service;
pub mod types;
pub mod validation;

pub use contract::ContractGateway;
pub use service::VotingService;
pub use types::{CallIntent, PollCreation, PollInfo, PollRef, PollStatus};
pub use validation::PayloadError;
