//! Learner-side records: word states, exposure history and answers.

mod history;
mod state;

pub use history::{AnswerResult, PhraseHistoryEntry, SHOWN_RESULT};
pub use state::{StateCounts, StateMap, UserId, WordState, WordStateKind};
