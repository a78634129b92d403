//! Difficulty cost of a phrase for one learner.
//!
//! cost = a1*n_new + a2*n_intro + a3*n_learn
//!      + b1*(length - ideal)^2
//!      - c1*ln(freq + 1)
//!
//! Lower is easier. KNOWN and MATURE words add nothing.

use serde::Serialize;

use crate::corpus::WordId;
use crate::learner::{StateMap, WordStateKind};
use crate::scheduler::config::DifficultyWeights;

/// Cost of a phrase plus the state counts it was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DifficultyScore {
    pub cost: f64,
    pub n_new: usize,
    pub n_intro: usize,
    pub n_learn: usize,
}

pub fn score_phrase(
    word_ids: &[WordId],
    freq: u64,
    length: u32,
    states: &StateMap,
    weights: &DifficultyWeights,
) -> DifficultyScore {
    let (mut n_new, mut n_intro, mut n_learn) = (0, 0, 0);
    for &word_id in word_ids {
        match states.get(word_id) {
            WordStateKind::New => n_new += 1,
            WordStateKind::Intro => n_intro += 1,
            WordStateKind::Learn => n_learn += 1,
            WordStateKind::Known | WordStateKind::Mature => {}
        }
    }

    let load = weights.a1 * n_new as f64 + weights.a2 * n_intro as f64 + weights.a3 * n_learn as f64;
    let length_penalty = weights.b1 * (length as f64 - weights.ideal_length).powi(2);
    let frequency_bonus = weights.c1 * (freq as f64 + 1.0).ln();

    DifficultyScore {
        cost: load + length_penalty - frequency_bonus,
        n_new,
        n_intro,
        n_learn,
    }
}
