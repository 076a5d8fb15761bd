//! Domain types for polls and the calls made against them.

use alloy::primitives::{Address, TxHash};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// A state-changing call against the voting contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallIntent {
    CreatePoll {
        question: String,
        answers: Vec<String>,
        multiple_choice: bool,
        /// Unix timestamp (seconds) voting opens.
        start_time: u64,
        /// Voting window in seconds.
        duration: u64,
    },
    Vote {
        poll_id: u64,
        /// Zero-based indices into the poll's answer list.
        answer_ids: Vec<u32>,
    },
    CancelPoll {
        poll_id: u64,
    },
    RescheduleVoting {
        poll_id: u64,
        start_time: u64,
        duration: u64,
    },
}

impl CallIntent {
    /// Short operation name for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            CallIntent::CreatePoll { .. } => "create_poll",
            CallIntent::Vote { .. } => "vote",
            CallIntent::CancelPoll { .. } => "cancel_poll",
            CallIntent::RescheduleVoting { .. } => "reschedule_voting",
        }
    }
}

/// Where a poll stands at a given moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    Canceled,
    NotStarted,
    Active,
    Ended,
}

impl fmt::Display for PollStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PollStatus::Canceled => "canceled",
            PollStatus::NotStarted => "not started",
            PollStatus::Active => "active",
            PollStatus::Ended => "ended",
        };
        f.write_str(s)
    }
}

/// A poll record as stored by the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollInfo {
    pub creator: Address,
    pub start_time: u64,
    pub end_time: u64,
    pub question: String,
    pub answers: Vec<String>,
    pub multiple_choice: bool,
    pub canceled: bool,
}

impl PollInfo {
    /// Status at unix time `now`. Both `start_time` and `end_time` are
    /// inside the voting window.
    pub fn status(&self, now: u64) -> PollStatus {
        if self.canceled {
            PollStatus::Canceled
        } else if now < self.start_time {
            PollStatus::NotStarted
        } else if now <= self.end_time {
            PollStatus::Active
        } else {
            PollStatus::Ended
        }
    }
}

/// Result of a confirmed poll creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PollCreation {
    pub tx_hash: TxHash,
    pub poll_id: u64,
}

/// A poll addressed either by id or by the hash of its creation transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollRef {
    Id(u64),
    CreationTx(TxHash),
}

impl FromStr for PollRef {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.starts_with("0x") && s.len() == 66 {
            return s
                .parse::<TxHash>()
                .map(PollRef::CreationTx)
                .map_err(|e| format!("invalid transaction hash '{}': {}", s, e));
        }
        s.parse::<u64>()
            .map(PollRef::Id)
            .map_err(|_| format!("'{}' is neither a poll id nor a transaction hash", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn poll(canceled: bool) -> PollInfo {
        PollInfo {
            creator: Address::ZERO,
            start_time: 100,
            end_time: 200,
            question: "Lunch?".to_string(),
            answers: vec!["Pizza".to_string(), "Sushi".to_string()],
            multiple_choice: false,
            canceled,
        }
    }

    #[test]
    fn test_status_window() {
        let p = poll(false);
        assert_eq!(p.status(99), PollStatus::NotStarted);
        assert_eq!(p.status(100), PollStatus::Active);
        assert_eq!(p.status(199), PollStatus::Active);
    }

    #[test]
    fn test_end_time_is_still_open() {
        let p = poll(false);
        assert_eq!(p.status(200), PollStatus::Active);
        assert_eq!(p.status(201), PollStatus::Ended);
    }

    #[test]
    fn test_canceled_wins() {
        assert_eq!(poll(true).status(150), PollStatus::Canceled);
    }

    #[test]
    fn test_poll_ref_parsing() {
        assert_eq!("17".parse::<PollRef>().unwrap(), PollRef::Id(17));
        let hash = format!("0x{}", "ab".repeat(32));
        assert_eq!(
            hash.parse::<PollRef>().unwrap(),
            PollRef::CreationTx(TxHash::repeat_byte(0xab))
        );
        assert!("0x12".parse::<PollRef>().is_err());
        assert!("seventeen".parse::<PollRef>().is_err());
    }

    #[test]
    fn test_intent_labels() {
        assert_eq!(CallIntent::CancelPoll { poll_id: 1 }.label(), "cancel_poll");
        assert_eq!(
            CallIntent::Vote {
                poll_id: 1,
                answer_ids: vec![0]
            }
            .label(),
            "vote"
        );
    }
}
