//! ABI encoding and decoding for the voting contract.
//!
//! Text fields travel as raw `bytes` holding UTF-8; numeric fields are
//! `uint256` on the wire and narrowed to native integers on the way back.
//! Anything that does not fit is a `MalformedResponse`, never a silent
//! truncation.

use alloy::primitives::{Address, Bytes, Log, U256};
use alloy::sol;
use alloy::sol_types::SolCall;

use crate::blockchain::types::EncodedCall;
use crate::error::{RelayError, RelayResult};
use crate::voting::types::{CallIntent, PollInfo};
use crate::voting::validation::{validate_intent, PayloadError};

sol! {
    interface IVoting {
        function createPoll(bytes question, bytes[] answers, bool multipleChoices, uint256 startTime, uint256 duration) external;
        function vote(uint256 pollId, uint256[] answerIds) external;
        function cancelPoll(uint256 pollId) external;
        function updatePollSchedule(uint256 pollId, uint256 newStartTime, uint256 newDuration) external;

        function getPollInfo(uint256 pollId) external view returns (address creator, uint256 startTime, uint256 endTime, bytes question, bytes[] answers, bool multipleChoices, bool canceled);
        function getResults(uint256 pollId) external view returns (uint256[] memory);
        function getUserVotes(uint256 pollId, address user) external view returns (uint256[] memory);
        function getActivePolls() external view returns (uint256[] memory);
        function nextPollID() external view returns (uint256);
    }
}

/// Encodes calls to, and decodes answers from, one deployed contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContractGateway {
    address: Address,
}

impl ContractGateway {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Validate and encode a state-changing call.
    pub fn encode(&self, intent: &CallIntent) -> Result<EncodedCall, PayloadError> {
        validate_intent(intent)?;

        let input = match intent {
            CallIntent::CreatePoll {
                question,
                answers,
                multiple_choice,
                start_time,
                duration,
            } => IVoting::createPollCall {
                question: Bytes::copy_from_slice(question.as_bytes()),
                answers: answers
                    .iter()
                    .map(|a| Bytes::copy_from_slice(a.as_bytes()))
                    .collect(),
                multipleChoices: *multiple_choice,
                startTime: U256::from(*start_time),
                duration: U256::from(*duration),
            }
            .abi_encode(),
            CallIntent::Vote {
                poll_id,
                answer_ids,
            } => IVoting::voteCall {
                pollId: U256::from(*poll_id),
                answerIds: answer_ids.iter().map(|&id| U256::from(id)).collect(),
            }
            .abi_encode(),
            CallIntent::CancelPoll { poll_id } => IVoting::cancelPollCall {
                pollId: U256::from(*poll_id),
            }
            .abi_encode(),
            CallIntent::RescheduleVoting {
                poll_id,
                start_time,
                duration,
            } => IVoting::updatePollScheduleCall {
                pollId: U256::from(*poll_id),
                newStartTime: U256::from(*start_time),
                newDuration: U256::from(*duration),
            }
            .abi_encode(),
        };

        Ok(EncodedCall::new(self.address, input.into(), intent.label()))
    }

    pub fn poll_info_query(&self, poll_id: u64) -> EncodedCall {
        let input = IVoting::getPollInfoCall {
            pollId: U256::from(poll_id),
        }
        .abi_encode();
        EncodedCall::new(self.address, input.into(), "get_poll_info")
    }

    pub fn results_query(&self, poll_id: u64) -> EncodedCall {
        let input = IVoting::getResultsCall {
            pollId: U256::from(poll_id),
        }
        .abi_encode();
        EncodedCall::new(self.address, input.into(), "get_results")
    }

    pub fn user_votes_query(&self, poll_id: u64, voter: Address) -> EncodedCall {
        let input = IVoting::getUserVotesCall {
            pollId: U256::from(poll_id),
            user: voter,
        }
        .abi_encode();
        EncodedCall::new(self.address, input.into(), "get_user_votes")
    }

    pub fn active_polls_query(&self) -> EncodedCall {
        EncodedCall::new(
            self.address,
            IVoting::getActivePollsCall {}.abi_encode().into(),
            "get_active_polls",
        )
    }

    pub fn next_poll_id_query(&self) -> EncodedCall {
        EncodedCall::new(
            self.address,
            IVoting::nextPollIDCall {}.abi_encode().into(),
            "next_poll_id",
        )
    }

    pub fn decode_poll_info(&self, raw: &[u8]) -> RelayResult<PollInfo> {
        let ret = IVoting::getPollInfoCall::abi_decode_returns(raw)
            .map_err(|e| malformed("getPollInfo", e))?;

        Ok(PollInfo {
            creator: ret.creator,
            start_time: narrow_u64(ret.startTime, "startTime")?,
            end_time: narrow_u64(ret.endTime, "endTime")?,
            question: utf8(&ret.question, "question")?,
            answers: ret
                .answers
                .iter()
                .map(|a| utf8(a, "answer"))
                .collect::<RelayResult<_>>()?,
            multiple_choice: ret.multipleChoices,
            canceled: ret.canceled,
        })
    }

    /// Decode vote counts. The vector must line up with the poll's answers.
    pub fn decode_results(&self, raw: &[u8], answer_count: usize) -> RelayResult<Vec<u64>> {
        let counts = IVoting::getResultsCall::abi_decode_returns(raw)
            .map_err(|e| malformed("getResults", e))?;

        if counts.len() != answer_count {
            return Err(RelayError::MalformedResponse(format!(
                "getResults returned {} counts for {} answers",
                counts.len(),
                answer_count
            )));
        }
        counts
            .into_iter()
            .map(|c| narrow_u64(c, "vote count"))
            .collect()
    }

    pub fn decode_user_votes(&self, raw: &[u8]) -> RelayResult<Vec<u32>> {
        let ids = IVoting::getUserVotesCall::abi_decode_returns(raw)
            .map_err(|e| malformed("getUserVotes", e))?;

        ids.into_iter()
            .map(|id| {
                u32::try_from(id).map_err(|_| {
                    RelayError::MalformedResponse(format!("answer index {} out of range", id))
                })
            })
            .collect()
    }

    pub fn decode_poll_ids(&self, raw: &[u8]) -> RelayResult<Vec<u64>> {
        let ids = IVoting::getActivePollsCall::abi_decode_returns(raw)
            .map_err(|e| malformed("getActivePolls", e))?;

        ids.into_iter().map(|id| narrow_u64(id, "poll id")).collect()
    }

    pub fn decode_next_poll_id(&self, raw: &[u8]) -> RelayResult<u64> {
        let next = IVoting::nextPollIDCall::abi_decode_returns(raw)
            .map_err(|e| malformed("nextPollID", e))?;
        narrow_u64(next, "nextPollID")
    }

    /// Poll id announced by a creation receipt.
    ///
    /// Takes the first log emitted by this contract with an indexed topic
    /// and reads that topic as the id. `None` if there is no such log.
    pub fn poll_id_from_logs(&self, logs: &[Log]) -> RelayResult<Option<u64>> {
        let topic = logs
            .iter()
            .filter(|log| log.address == self.address)
            .find_map(|log| log.topics().get(1).copied());

        match topic {
            Some(topic) => narrow_u64(U256::from_be_bytes(topic.0), "poll id topic").map(Some),
            None => Ok(None),
        }
    }
}

fn malformed(what: &str, err: impl std::fmt::Display) -> RelayError {
    RelayError::MalformedResponse(format!("{} returned unexpected data: {}", what, err))
}

fn narrow_u64(value: U256, field: &str) -> RelayResult<u64> {
    u64::try_from(value)
        .map_err(|_| RelayError::MalformedResponse(format!("{} {} does not fit in u64", field, value)))
}

fn utf8(raw: &Bytes, field: &str) -> RelayResult<String> {
    String::from_utf8(raw.to_vec())
        .map_err(|_| RelayError::MalformedResponse(format!("{} is not valid UTF-8", field)))
}
