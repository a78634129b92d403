//! Corpus record types.
//!
//! Words and phrases are produced offline and never change once loaded.
//! Ids are dense integers assigned at corpus-build time.

use serde::{Deserialize, Serialize};

/// Dense word id (`0..N-1`).
pub type WordId = u32;

/// Dense phrase id.
pub type PhraseId = u32;

/// A vocabulary entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Word {
    pub id: WordId,
    pub text: String,
    /// Sum of the frequencies of every phrase containing the word
    pub total_freq: u64,
    /// 1 = most frequent word
    pub rank: u32,
}

/// A phrase row as stored in the phrase table, without its words.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhraseRecord {
    pub id: PhraseId,
    pub text: String,
    pub freq: u64,
    pub cluster_size: u32,
    pub length: u32,
}

/// A phrase together with its ordered word sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Phrase {
    pub id: PhraseId,
    pub text: String,
    pub freq: u64,
    pub cluster_size: u32,
    pub length: u32,
    pub word_ids: Vec<WordId>,
}

impl Phrase {
    pub fn from_record(record: PhraseRecord, word_ids: Vec<WordId>) -> Self {
        Self {
            id: record.id,
            text: record.text,
            freq: record.freq,
            cluster_size: record.cluster_size,
            length: record.length,
            word_ids,
        }
    }

    /// Check whether the word occurs in this phrase.
    pub fn contains(&self, word_id: WordId) -> bool {
        self.word_ids.contains(&word_id)
    }

    /// True when the same word id occurs more than once.
    pub fn has_repeated_words(&self) -> bool {
        self.word_ids
            .iter()
            .enumerate()
            .any(|(i, w)| self.word_ids[i + 1..].contains(w))
    }
}

/// Association between a phrase and one of its words.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PhraseWordLink {
    pub phrase_id: PhraseId,
    pub word_id: WordId,
    /// Zero-based position in the phrase, when the link table carries it
    pub position: Option<u32>,
}
