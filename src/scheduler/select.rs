//! Candidate selection.
//!
//! The selector builds the user's unknown pool, scores every phrase that
//! contains a pool word, and walks the policy chain until one policy
//! admits a phrase:
//! - **Strict**: load caps on NEW/INTRO/LEARN words, never-shown phrases only
//! - **Relaxed**: single NEW word, length cap, repeats allowed
//!
//! Within a policy the cheapest phrase wins; equal costs keep the phrase
//! encountered first (pool rank order, then ascending phrase id).

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use log::debug;
use serde::Serialize;

use crate::corpus::{Phrase, PhraseId, WordId};
use crate::error::{Result, SchedulerError};
use crate::learner::{StateMap, WordStateKind};
use crate::scheduler::config::{DifficultyWeights, SchedulerConfig};
use crate::scheduler::difficulty::{DifficultyScore, score_phrase};
use crate::scheduler::policy::{ConstraintPolicy, SelectionMode, default_policies};
use crate::store::CandidateStore;

/// A selected phrase and the word it introduces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhraseResult {
    pub phrase_id: PhraseId,
    pub phrase_text: String,
    pub target_word_id: WordId,
    pub target_word_text: String,
    pub cost: f64,
    pub n_new: usize,
    pub n_intro: usize,
    pub n_learn: usize,
    pub freq: u64,
    pub length: u32,
    pub mode: SelectionMode,
}

/// Outcome of one selection.
#[derive(Debug, Clone, PartialEq)]
pub enum NextPhrase {
    Found(PhraseResult),
    /// Nothing left to introduce under any policy
    NoCandidate,
}

impl NextPhrase {
    pub fn found(&self) -> Option<&PhraseResult> {
        match self {
            NextPhrase::Found(result) => Some(result),
            NextPhrase::NoCandidate => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, NextPhrase::Found(_))
    }
}

struct Candidate {
    phrase: Phrase,
    score: DifficultyScore,
    /// First NEW word in phrase order
    target_id: WordId,
}

/// Selects the next phrase for one user. Stateless between calls.
#[derive(Debug, Clone)]
pub struct Selector {
    weights: DifficultyWeights,
    pool_size: usize,
    policies: Vec<ConstraintPolicy>,
}

impl Selector {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            weights: config.weights,
            pool_size: config.top_unknown_candidates,
            policies: default_policies(config),
        }
    }

    /// Replace the policy chain.
    pub fn with_policies(mut self, policies: Vec<ConstraintPolicy>) -> Self {
        self.policies = policies;
        self
    }

    pub fn policies(&self) -> &[ConstraintPolicy] {
        &self.policies
    }

    /// Run the policy chain against the store's view of one user.
    pub fn select<S: CandidateStore + ?Sized>(&self, store: &S) -> Result<NextPhrase> {
        let pool = store.unknown_pool(self.pool_size)?;
        if pool.is_empty() {
            debug!("Unknown pool is empty");
            return Ok(NextPhrase::NoCandidate);
        }

        let states = store.word_states()?;
        let candidates = self.score_candidates(store, &pool, &states)?;
        debug!(
            "Scored {} candidate phrases over {} pool words",
            candidates.len(),
            pool.len()
        );

        // History lookups are shared across passes
        let shown: RefCell<HashMap<PhraseId, bool>> = RefCell::new(HashMap::new());
        let was_shown = |phrase_id: PhraseId| -> Result<bool> {
            if let Some(&hit) = shown.borrow().get(&phrase_id) {
                return Ok(hit);
            }
            let hit = store.was_shown(phrase_id)?;
            shown.borrow_mut().insert(phrase_id, hit);
            Ok(hit)
        };

        for policy in &self.policies {
            let mut best: Option<&Candidate> = None;
            for candidate in &candidates {
                if !policy.admits(&candidate.score, candidate.phrase.length) {
                    continue;
                }
                if best.is_some_and(|b| candidate.score.cost >= b.score.cost) {
                    continue;
                }
                if !policy.allow_repeats && was_shown(candidate.phrase.id)? {
                    continue;
                }
                best = Some(candidate);
            }

            match best {
                Some(candidate) => {
                    debug!(
                        "{} pass chose phrase {} (cost {:.3})",
                        policy.mode, candidate.phrase.id, candidate.score.cost
                    );
                    return Ok(NextPhrase::Found(self.build_result(store, candidate, policy.mode)?));
                }
                None => debug!("{} pass admitted nothing", policy.mode),
            }
        }

        Ok(NextPhrase::NoCandidate)
    }

    /// Score each distinct phrase containing a pool word, in encounter order.
    fn score_candidates<S: CandidateStore + ?Sized>(
        &self,
        store: &S,
        pool: &[WordId],
        states: &StateMap,
    ) -> Result<Vec<Candidate>> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for &word_id in pool {
            for phrase_id in store.phrases_containing(word_id)? {
                if !seen.insert(phrase_id) {
                    continue;
                }
                let Some(phrase) = store.phrase(phrase_id)? else {
                    continue;
                };
                if phrase.has_repeated_words() {
                    debug!("Skipping phrase {} with a repeated word", phrase.id);
                    continue;
                }
                let Some(target_id) = phrase
                    .word_ids
                    .iter()
                    .copied()
                    .find(|&w| states.get(w) == WordStateKind::New)
                else {
                    continue;
                };
                let score = score_phrase(&phrase.word_ids, phrase.freq, phrase.length, states, &self.weights);
                candidates.push(Candidate {
                    phrase,
                    score,
                    target_id,
                });
            }
        }

        Ok(candidates)
    }

    fn build_result<S: CandidateStore + ?Sized>(
        &self,
        store: &S,
        candidate: &Candidate,
        mode: SelectionMode,
    ) -> Result<PhraseResult> {
        let phrase = &candidate.phrase;
        let target = store
            .word(candidate.target_id)?
            .ok_or(SchedulerError::WordNotFound(candidate.target_id))?;

        Ok(PhraseResult {
            phrase_id: phrase.id,
            phrase_text: phrase.text.clone(),
            target_word_id: target.id,
            target_word_text: target.text,
            cost: candidate.score.cost,
            n_new: candidate.score.n_new,
            n_intro: candidate.score.n_intro,
            n_learn: candidate.score.n_learn,
            freq: phrase.freq,
            length: phrase.length,
            mode,
        })
    }
}
