//! Storage capability traits.
//!
//! The selector is written once against [`CandidateStore`]; both the
//! in-memory snapshot and the SQLite store provide it through the
//! per-user sessions opened by [`LearnerStore`].

use chrono::{DateTime, Utc};

use crate::corpus::{Phrase, PhraseId, Word, WordId};
use crate::error::Result;
use crate::learner::{PhraseHistoryEntry, StateCounts, StateMap, UserId, WordStateKind};

/// Read-only view of the corpus and of one user's learner state.
pub trait CandidateStore {
    /// Words without a state row, most frequent first, at most `limit`.
    fn unknown_pool(&self, limit: usize) -> Result<Vec<WordId>>;

    /// Phrases containing the word, ascending phrase id.
    fn phrases_containing(&self, word_id: WordId) -> Result<Vec<PhraseId>>;

    /// Get a phrase with its ordered word ids.
    fn phrase(&self, phrase_id: PhraseId) -> Result<Option<Phrase>>;

    /// Get a word by id.
    fn word(&self, word_id: WordId) -> Result<Option<Word>>;

    /// Look up a word id by its surface form.
    fn word_id(&self, text: &str) -> Result<Option<WordId>>;

    /// States of every word the user has a row for.
    fn word_states(&self) -> Result<StateMap>;

    /// Whether the phrase was ever presented to the user.
    fn was_shown(&self, phrase_id: PhraseId) -> Result<bool>;

    /// Word counts per state, NEW including words without a row.
    fn state_counts(&self) -> Result<StateCounts>;
}

/// Write side of a user session. Writes become visible only when the
/// session's closure returns `Ok`.
pub trait ExposureSink: CandidateStore {
    /// Append one presentation to the phrase history.
    fn append_history(&mut self, entry: &PhraseHistoryEntry) -> Result<()>;

    /// Create an INTRO row for the word unless a row already exists.
    ///
    /// Returns `true` when a row was created.
    fn introduce_word(&mut self, word_id: WordId, seen_at: DateTime<Utc>) -> Result<bool>;
}

/// Store of per-user learner state over a shared corpus.
///
/// Sessions for the same user are serialized: a `write` session holds the
/// user's state exclusively from its first read to its commit.
pub trait LearnerStore: Send + Sync {
    /// Run `f` against a consistent read-only view of the user's state.
    fn read<R>(&self, user: UserId, f: impl FnOnce(&dyn CandidateStore) -> Result<R>) -> Result<R>;

    /// Run `f` in an exclusive session; all writes commit together or not at all.
    fn write<R>(&self, user: UserId, f: impl FnOnce(&mut dyn ExposureSink) -> Result<R>) -> Result<R>;

    /// Set word states directly, overwriting existing rows.
    fn seed_states(&self, user: UserId, states: &[(WordId, WordStateKind)]) -> Result<()>;

    /// Number of words in the corpus.
    fn word_count(&self) -> Result<usize>;
}
