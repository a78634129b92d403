//! In-memory learner store over a shared `CorpusIndex`.
//!
//! Each user's state sits behind its own mutex, so sessions for one user
//! are serialized while different users proceed in parallel. Writes made
//! inside a session are staged and applied only when the session succeeds.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::corpus::{CorpusIndex, Phrase, PhraseId, Word, WordId};
use crate::error::{Result, SchedulerError};
use crate::learner::{PhraseHistoryEntry, StateCounts, StateMap, UserId, WordState, WordStateKind};
use crate::store::traits::{CandidateStore, ExposureSink, LearnerStore};

/// One user's word states and exposure log.
#[derive(Debug, Clone, Default)]
pub struct LearnerState {
    words: HashMap<WordId, WordState>,
    history: Vec<PhraseHistoryEntry>,
    shown: HashSet<PhraseId>,
}

impl LearnerState {
    fn apply(&mut self, pending: Pending) {
        for (word_id, state) in pending.words {
            self.words.entry(word_id).or_insert(state);
        }
        for entry in pending.history {
            self.shown.insert(entry.phrase_id);
            self.history.push(entry);
        }
    }
}

#[derive(Debug, Default)]
struct Pending {
    words: Vec<(WordId, WordState)>,
    history: Vec<PhraseHistoryEntry>,
}

/// Learner store that keeps everything in process memory.
pub struct MemoryStore {
    corpus: Arc<CorpusIndex>,
    users: Mutex<HashMap<UserId, Arc<Mutex<LearnerState>>>>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("words", &self.corpus.word_count())
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    pub fn new(corpus: Arc<CorpusIndex>) -> Self {
        Self {
            corpus,
            users: Mutex::new(HashMap::new()),
        }
    }

    pub fn corpus(&self) -> &CorpusIndex {
        &self.corpus
    }

    /// Get the stored state row for a word, if any.
    pub fn word_state(&self, user: UserId, word_id: WordId) -> Result<Option<WordState>> {
        let cell = self.user(user)?;
        let state = lock(&cell)?;
        Ok(state.words.get(&word_id).cloned())
    }

    /// Get the user's exposure log, oldest first.
    pub fn history(&self, user: UserId) -> Result<Vec<PhraseHistoryEntry>> {
        let cell = self.user(user)?;
        let state = lock(&cell)?;
        Ok(state.history.clone())
    }

    fn user(&self, user: UserId) -> Result<Arc<Mutex<LearnerState>>> {
        let mut users = lock(&self.users)?;
        Ok(users.entry(user).or_default().clone())
    }
}

impl LearnerStore for MemoryStore {
    fn read<R>(&self, user: UserId, f: impl FnOnce(&dyn CandidateStore) -> Result<R>) -> Result<R> {
        let cell = self.user(user)?;
        let state = lock(&cell)?;
        let session = MemorySession {
            corpus: &self.corpus,
            state: &state,
            pending: Pending::default(),
        };
        f(&session)
    }

    fn write<R>(&self, user: UserId, f: impl FnOnce(&mut dyn ExposureSink) -> Result<R>) -> Result<R> {
        let cell = self.user(user)?;
        let mut state = lock(&cell)?;
        let (result, pending) = {
            let mut session = MemorySession {
                corpus: &self.corpus,
                state: &state,
                pending: Pending::default(),
            };
            let result = f(&mut session)?;
            (result, session.pending)
        };
        state.apply(pending);
        Ok(result)
    }

    fn seed_states(&self, user: UserId, states: &[(WordId, WordStateKind)]) -> Result<()> {
        let cell = self.user(user)?;
        let mut state = lock(&cell)?;
        for &(word_id, kind) in states {
            if self.corpus.word(word_id).is_none() {
                return Err(SchedulerError::WordNotFound(word_id));
            }
            state.words.insert(word_id, WordState::with_state(kind));
        }
        Ok(())
    }

    fn word_count(&self) -> Result<usize> {
        Ok(self.corpus.word_count())
    }
}

struct MemorySession<'a> {
    corpus: &'a CorpusIndex,
    state: &'a LearnerState,
    pending: Pending,
}

impl MemorySession<'_> {
    fn has_row(&self, word_id: WordId) -> bool {
        self.state.words.contains_key(&word_id) || self.pending.words.iter().any(|(w, _)| *w == word_id)
    }
}

impl CandidateStore for MemorySession<'_> {
    fn unknown_pool(&self, limit: usize) -> Result<Vec<WordId>> {
        Ok(self
            .corpus
            .words_by_rank()
            .filter(|w| !self.has_row(w.id))
            .take(limit)
            .map(|w| w.id)
            .collect())
    }

    fn phrases_containing(&self, word_id: WordId) -> Result<Vec<PhraseId>> {
        Ok(self.corpus.phrases_containing(word_id).to_vec())
    }

    fn phrase(&self, phrase_id: PhraseId) -> Result<Option<Phrase>> {
        Ok(self.corpus.phrase(phrase_id).cloned())
    }

    fn word(&self, word_id: WordId) -> Result<Option<Word>> {
        Ok(self.corpus.word(word_id).cloned())
    }

    fn word_id(&self, text: &str) -> Result<Option<WordId>> {
        Ok(self.corpus.word_by_text(text).map(|w| w.id))
    }

    fn word_states(&self) -> Result<StateMap> {
        let stored = self.state.words.iter().map(|(&w, s)| (w, s.state));
        let staged = self.pending.words.iter().map(|(w, s)| (*w, s.state));
        Ok(stored.chain(staged).collect())
    }

    fn was_shown(&self, phrase_id: PhraseId) -> Result<bool> {
        Ok(self.state.shown.contains(&phrase_id) || self.pending.history.iter().any(|e| e.phrase_id == phrase_id))
    }

    fn state_counts(&self) -> Result<StateCounts> {
        let states = self.word_states()?;
        let rows = self
            .corpus
            .words_by_rank()
            .filter(|w| states.has_row(w.id))
            .map(|w| states.get(w.id));
        Ok(StateCounts::from_rows(self.corpus.word_count(), rows))
    }
}

impl ExposureSink for MemorySession<'_> {
    fn append_history(&mut self, entry: &PhraseHistoryEntry) -> Result<()> {
        // Keyed by (phrase, shown_at); a repeated event is a no-op
        let duplicate = self
            .state
            .history
            .iter()
            .chain(&self.pending.history)
            .any(|e| e.phrase_id == entry.phrase_id && e.shown_at == entry.shown_at);
        if !duplicate {
            self.pending.history.push(entry.clone());
        }
        Ok(())
    }

    fn introduce_word(&mut self, word_id: WordId, seen_at: DateTime<Utc>) -> Result<bool> {
        if self.has_row(word_id) {
            return Ok(false);
        }
        self.pending.words.push((word_id, WordState::introduced(seen_at)));
        Ok(true)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex.lock().map_err(|e| SchedulerError::Storage(e.to_string()))
}
