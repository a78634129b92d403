//! Immutable in-memory corpus index.
//!
//! Built once from the word, phrase and link tables, then shared by
//! reference (usually behind an `Arc`) across every user.

use std::collections::{BTreeMap, HashMap};

use log::warn;
use serde::Serialize;

use crate::corpus::types::{Phrase, PhraseId, PhraseRecord, PhraseWordLink, Word, WordId};

/// Counts of accepted and rejected rows while building an index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub words: usize,
    pub phrases: usize,
    pub links: usize,
    pub skipped_words: usize,
    pub skipped_phrases: usize,
    pub skipped_links: usize,
}

impl LoadReport {
    pub fn skipped(&self) -> usize {
        self.skipped_words + self.skipped_phrases + self.skipped_links
    }
}

/// Word and phrase tables keyed by their dense ids.
#[derive(Debug, Default)]
pub struct CorpusIndex {
    words: Vec<Option<Word>>,
    phrases: BTreeMap<PhraseId, Phrase>,
    /// Word ids ordered by ascending rank, ties by id
    by_rank: Vec<WordId>,
    /// Phrases containing each word, ascending phrase id
    word_phrases: Vec<Vec<PhraseId>>,
    word_lookup: HashMap<String, WordId>,
}

impl CorpusIndex {
    /// Build an index from raw rows.
    ///
    /// Inconsistent rows (duplicate ids, word ids outside `0..N-1`, links to
    /// unknown words, phrases whose length disagrees with their links) are
    /// skipped and counted in the returned report.
    pub fn build(words: Vec<Word>, phrases: Vec<PhraseRecord>, links: Vec<PhraseWordLink>) -> (Self, LoadReport) {
        let mut report = LoadReport::default();
        let mut index = CorpusIndex::default();

        // Word ids are dense, so the row count bounds the table
        let rows = words.len();
        index.words = vec![None; rows];
        for word in words {
            if word.id as usize >= rows {
                warn!(
                    "Skipping word row with id {} outside 0..{}: text={:?}",
                    word.id, rows, word.text
                );
                report.skipped_words += 1;
                continue;
            }
            let slot = &mut index.words[word.id as usize];
            if slot.is_some() || index.word_lookup.contains_key(&word.text) {
                warn!("Skipping duplicate word row: id={} text={:?}", word.id, word.text);
                report.skipped_words += 1;
                continue;
            }
            index.word_lookup.insert(word.text.clone(), word.id);
            *slot = Some(word);
            report.words += 1;
        }

        // Group links per phrase, keeping arrival order for rows without a position
        let mut grouped: HashMap<PhraseId, Vec<(u32, WordId)>> = HashMap::new();
        for link in links {
            if index.word(link.word_id).is_none() {
                warn!(
                    "Skipping link to unknown word: phrase={} word={}",
                    link.phrase_id, link.word_id
                );
                report.skipped_links += 1;
                continue;
            }
            let entries = grouped.entry(link.phrase_id).or_default();
            let order = link.position.unwrap_or(entries.len() as u32);
            entries.push((order, link.word_id));
            report.links += 1;
        }

        for record in phrases {
            if index.phrases.contains_key(&record.id) {
                warn!("Skipping duplicate phrase row: id={}", record.id);
                report.skipped_phrases += 1;
                continue;
            }
            let Some(mut entries) = grouped.remove(&record.id) else {
                warn!("Skipping phrase without words: id={} text={:?}", record.id, record.text);
                report.skipped_phrases += 1;
                continue;
            };
            if entries.len() != record.length as usize {
                warn!(
                    "Skipping phrase {}: length {} but {} linked words",
                    record.id,
                    record.length,
                    entries.len()
                );
                report.skipped_phrases += 1;
                continue;
            }
            entries.sort_by_key(|(order, _)| *order);
            let word_ids = entries.into_iter().map(|(_, w)| w).collect();
            index.phrases.insert(record.id, Phrase::from_record(record, word_ids));
            report.phrases += 1;
        }

        // Links pointing at phrases that were never loaded
        for (phrase_id, entries) in grouped {
            warn!("Skipping {} links to unknown phrase {}", entries.len(), phrase_id);
            report.links -= entries.len();
            report.skipped_links += entries.len();
        }

        index.word_phrases = vec![Vec::new(); index.words.len()];
        for phrase in index.phrases.values() {
            for (i, &word_id) in phrase.word_ids.iter().enumerate() {
                if phrase.word_ids[..i].contains(&word_id) {
                    continue;
                }
                index.word_phrases[word_id as usize].push(phrase.id);
            }
        }

        let mut by_rank: Vec<&Word> = index.words.iter().flatten().collect();
        by_rank.sort_by_key(|w| (w.rank, w.id));
        index.by_rank = by_rank.into_iter().map(|w| w.id).collect();

        (index, report)
    }

    pub fn word(&self, id: WordId) -> Option<&Word> {
        self.words.get(id as usize).and_then(Option::as_ref)
    }

    pub fn word_by_text(&self, text: &str) -> Option<&Word> {
        self.word_lookup.get(text).and_then(|&id| self.word(id))
    }

    pub fn phrase(&self, id: PhraseId) -> Option<&Phrase> {
        self.phrases.get(&id)
    }

    /// Phrases containing the word, ascending phrase id.
    pub fn phrases_containing(&self, word_id: WordId) -> &[PhraseId] {
        self.word_phrases
            .get(word_id as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Words from most to least frequent.
    pub fn words_by_rank(&self) -> impl Iterator<Item = &Word> {
        self.by_rank.iter().filter_map(|&id| self.word(id))
    }

    /// Phrases in ascending id order.
    pub fn phrases(&self) -> impl Iterator<Item = &Phrase> {
        self.phrases.values()
    }

    pub fn word_count(&self) -> usize {
        self.by_rank.len()
    }

    pub fn phrase_count(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_rank.is_empty()
    }
}
