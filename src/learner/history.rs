//! Phrase exposure log and review outcomes.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::corpus::PhraseId;
use crate::error::SchedulerError;

/// Result recorded when a phrase is presented, before any answer.
pub const SHOWN_RESULT: &str = "shown";

/// One presentation of a phrase to a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhraseHistoryEntry {
    pub phrase_id: PhraseId,
    pub shown_at: DateTime<Utc>,
    pub result: String,
}

impl PhraseHistoryEntry {
    pub fn shown(phrase_id: PhraseId, shown_at: DateTime<Utc>) -> Self {
        Self {
            phrase_id,
            shown_at,
            result: SHOWN_RESULT.to_string(),
        }
    }
}

/// Learner's self-graded answer to a presented phrase.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AnswerResult {
    Again,
    Hard,
    Good,
    Easy,
}

impl AnswerResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerResult::Again => "again",
            AnswerResult::Hard => "hard",
            AnswerResult::Good => "good",
            AnswerResult::Easy => "easy",
        }
    }
}

impl std::fmt::Display for AnswerResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AnswerResult {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "again" => Ok(AnswerResult::Again),
            "hard" => Ok(AnswerResult::Hard),
            "good" => Ok(AnswerResult::Good),
            "easy" => Ok(AnswerResult::Easy),
            other => Err(SchedulerError::Config(format!(
                "unknown answer '{other}' (expected again, hard, good or easy)"
            ))),
        }
    }
}
