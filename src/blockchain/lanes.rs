//! Per-signer submission lanes.
//!
//! A signer's nonce comes from its pending transaction count, which is only
//! coherent while one submission per signer is in flight. Each signer gets a
//! lane; submissions for the same signer queue on it, different signers run
//! in parallel.

use alloy::primitives::Address;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Held for the duration of one submission.
pub type LaneGuard = OwnedMutexGuard<()>;

#[derive(Clone, Default)]
pub struct SignerLanes {
    lanes: Arc<DashMap<Address, Arc<Mutex<()>>>>,
}

impl SignerLanes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of `signer`'s lane.
    pub async fn acquire(&self, signer: Address) -> LaneGuard {
        let lane = self.lanes.entry(signer).or_default().clone();
        lane.lock_owned().await
    }

    /// Number of signers that have used a lane so far.
    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }
}
