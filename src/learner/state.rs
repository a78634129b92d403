//! Per-user word familiarity state.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::corpus::WordId;
use crate::error::SchedulerError;

/// Learner id.
pub type UserId = i64;

/// Familiarity of a (user, word) pair, from least to most familiar.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum WordStateKind {
    /// Never shown as a target (implicit when no row exists)
    #[default]
    New,
    /// Shown once as the target of a phrase
    Intro,
    /// In review
    Learn,
    Known,
    Mature,
}

impl WordStateKind {
    pub const ALL: [WordStateKind; 5] = [
        WordStateKind::New,
        WordStateKind::Intro,
        WordStateKind::Learn,
        WordStateKind::Known,
        WordStateKind::Mature,
    ];

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            WordStateKind::New => "NEW",
            WordStateKind::Intro => "INTRO",
            WordStateKind::Learn => "LEARN",
            WordStateKind::Known => "KNOWN",
            WordStateKind::Mature => "MATURE",
        }
    }
}

impl std::fmt::Display for WordStateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for WordStateKind {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NEW" => Ok(WordStateKind::New),
            "INTRO" => Ok(WordStateKind::Intro),
            "LEARN" => Ok(WordStateKind::Learn),
            "KNOWN" => Ok(WordStateKind::Known),
            "MATURE" => Ok(WordStateKind::Mature),
            other => Err(SchedulerError::Storage(format!("unknown word state: {other}"))),
        }
    }
}

/// Stored state row for one (user, word) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WordState {
    pub state: WordStateKind,
    pub reps: u32,
    pub lapses: u32,
    pub last_result: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
    pub next_due: Option<DateTime<Utc>>,
}

impl WordState {
    /// Row written when a word is first shown as a target.
    pub fn introduced(seen_at: DateTime<Utc>) -> Self {
        Self {
            state: WordStateKind::Intro,
            reps: 0,
            lapses: 0,
            last_result: None,
            last_seen: Some(seen_at),
            next_due: None,
        }
    }

    /// Row with only a state label, for seeding.
    pub fn with_state(state: WordStateKind) -> Self {
        Self {
            state,
            reps: 0,
            lapses: 0,
            last_result: None,
            last_seen: None,
            next_due: None,
        }
    }
}

/// Word id to state lookup; missing words are NEW.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateMap {
    states: HashMap<WordId, WordStateKind>,
}

impl StateMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, word_id: WordId) -> WordStateKind {
        self.states.get(&word_id).copied().unwrap_or_default()
    }

    /// Whether a state row exists for the word.
    pub fn has_row(&self, word_id: WordId) -> bool {
        self.states.contains_key(&word_id)
    }

    pub fn insert(&mut self, word_id: WordId, state: WordStateKind) {
        self.states.insert(word_id, state);
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl FromIterator<(WordId, WordStateKind)> for StateMap {
    fn from_iter<I: IntoIterator<Item = (WordId, WordStateKind)>>(iter: I) -> Self {
        Self {
            states: iter.into_iter().collect(),
        }
    }
}

/// Number of corpus words in each state for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    pub new: usize,
    pub intro: usize,
    pub learn: usize,
    pub known: usize,
    pub mature: usize,
}

impl StateCounts {
    /// Count stored rows; every corpus word without a row counts as NEW.
    pub fn from_rows(total_words: usize, rows: impl IntoIterator<Item = WordStateKind>) -> Self {
        let mut counts = StateCounts::default();
        let mut stored = 0;
        for kind in rows {
            stored += 1;
            counts.add(kind, 1);
        }
        counts.new += total_words.saturating_sub(stored);
        counts
    }

    pub fn get(&self, kind: WordStateKind) -> usize {
        match kind {
            WordStateKind::New => self.new,
            WordStateKind::Intro => self.intro,
            WordStateKind::Learn => self.learn,
            WordStateKind::Known => self.known,
            WordStateKind::Mature => self.mature,
        }
    }

    pub fn add(&mut self, kind: WordStateKind, n: usize) {
        *self.slot(kind) += n;
    }

    pub fn total(&self) -> usize {
        self.new + self.intro + self.learn + self.known + self.mature
    }

    fn slot(&mut self, kind: WordStateKind) -> &mut usize {
        match kind {
            WordStateKind::New => &mut self.new,
            WordStateKind::Intro => &mut self.intro,
            WordStateKind::Learn => &mut self.learn,
            WordStateKind::Known => &mut self.known,
            WordStateKind::Mature => &mut self.mature,
        }
    }
}
