//! Payload bounds enforced before anything is encoded.
//!
//! The limits match what the deployed contract accepts. Text is measured in
//! UTF-8 bytes, and an oversized payload is rejected rather than truncated.

use std::collections::HashSet;
use thiserror::Error;

use crate::voting::types::CallIntent;

pub const MAX_QUESTION_BYTES: usize = 256;
pub const MAX_ANSWER_BYTES: usize = 100;
pub const MIN_ANSWERS: usize = 2;
pub const MAX_ANSWERS: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("question is {len} bytes, limit is {}", MAX_QUESTION_BYTES)]
    QuestionTooLong { len: usize },

    #[error("answer {index} must not be empty")]
    EmptyAnswer { index: usize },

    #[error("answer {index} is {len} bytes, limit is {}", MAX_ANSWER_BYTES)]
    AnswerTooLong { index: usize, len: usize },

    #[error("poll needs between {} and {} answers, got {count}", MIN_ANSWERS, MAX_ANSWERS)]
    AnswerCount { count: usize },

    #[error("duration must be greater than zero")]
    ZeroDuration,

    #[error("no answer selected")]
    EmptySelection,

    #[error("at most {} answers can be selected, got {count}", MAX_ANSWERS)]
    TooManySelections { count: usize },

    #[error("answer {0} selected more than once")]
    DuplicateSelection(u32),

    #[error("answer index {0} is out of range")]
    SelectionOutOfRange(u32),
}

/// Check `intent` against the contract's payload bounds.
pub fn validate_intent(intent: &CallIntent) -> Result<(), PayloadError> {
    match intent {
        CallIntent::CreatePoll {
            question,
            answers,
            duration,
            ..
        } => {
            validate_question(question)?;
            validate_answers(answers)?;
            validate_duration(*duration)
        }
        CallIntent::Vote { answer_ids, .. } => validate_selection(answer_ids),
        CallIntent::CancelPoll { .. } => Ok(()),
        CallIntent::RescheduleVoting { duration, .. } => validate_duration(*duration),
    }
}

fn validate_question(question: &str) -> Result<(), PayloadError> {
    match question.len() {
        0 => Err(PayloadError::EmptyQuestion),
        len if len > MAX_QUESTION_BYTES => Err(PayloadError::QuestionTooLong { len }),
        _ => Ok(()),
    }
}

fn validate_answers(answers: &[String]) -> Result<(), PayloadError> {
    if !(MIN_ANSWERS..=MAX_ANSWERS).contains(&answers.len()) {
        return Err(PayloadError::AnswerCount {
            count: answers.len(),
        });
    }
    for (index, answer) in answers.iter().enumerate() {
        match answer.len() {
            0 => return Err(PayloadError::EmptyAnswer { index }),
            len if len > MAX_ANSWER_BYTES => {
                return Err(PayloadError::AnswerTooLong { index, len })
            }
            _ => {}
        }
    }
    Ok(())
}

fn validate_duration(duration: u64) -> Result<(), PayloadError> {
    if duration == 0 {
        return Err(PayloadError::ZeroDuration);
    }
    Ok(())
}

fn validate_selection(answer_ids: &[u32]) -> Result<(), PayloadError> {
    if answer_ids.is_empty() {
        return Err(PayloadError::EmptySelection);
    }
    if answer_ids.len() > MAX_ANSWERS {
        return Err(PayloadError::TooManySelections {
            count: answer_ids.len(),
        });
    }
    let mut seen = HashSet::with_capacity(answer_ids.len());
    for &id in answer_ids {
        if id as usize >= MAX_ANSWERS {
            return Err(PayloadError::SelectionOutOfRange(id));
        }
        if !seen.insert(id) {
            return Err(PayloadError::DuplicateSelection(id));
        }
    }
    Ok(())
}
