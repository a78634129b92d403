//! Scheduler tunables.
//!
//! All limits default to the values used for beginner (A1-A2) material and
//! may be overridden per deployment (config file) or per call.

use serde::{Deserialize, Serialize};

/// Weights of the difficulty cost function.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DifficultyWeights {
    /// Cost per NEW word
    pub a1: f64,
    /// Cost per INTRO word
    pub a2: f64,
    /// Cost per LEARN word
    pub a3: f64,
    /// Quadratic penalty for distance from the ideal length
    pub b1: f64,
    /// Logarithmic frequency bonus
    pub c1: f64,
    pub ideal_length: f64,
}

impl Default for DifficultyWeights {
    fn default() -> Self {
        Self {
            a1: 3.0,
            a2: 2.0,
            a3: 1.0,
            b1: 0.3,
            c1: 0.5,
            ideal_length: 4.0,
        }
    }
}

/// Admission rule of the fallback pass.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RelaxedPolicy {
    /// Exactly one NEW word; already shown phrases allowed
    #[default]
    OneNew,
    /// Any NEW-word count; only the length cap applies
    AnyNew,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RelaxedConfig {
    pub policy: RelaxedPolicy,
    pub max_length: u32,
}

impl Default for RelaxedConfig {
    fn default() -> Self {
        Self {
            policy: RelaxedPolicy::OneNew,
            max_length: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    pub max_new: usize,
    pub max_new_plus_intro: usize,
    pub max_learn: usize,
    /// Size of the unknown-word pool searched per call
    pub top_unknown_candidates: usize,
    pub relaxed: RelaxedConfig,
    pub weights: DifficultyWeights,
    /// Extra attempts after a write conflict
    pub commit_retries: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_new: 1,
            max_new_plus_intro: 2,
            max_learn: 2,
            top_unknown_candidates: 200,
            relaxed: RelaxedConfig::default(),
            weights: DifficultyWeights::default(),
            commit_retries: 3,
        }
    }
}
