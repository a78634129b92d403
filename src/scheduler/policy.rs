//! Constraint policies tried in order by the selector.
//!
//! Each policy either admits a scored phrase or rejects it; the selector
//! moves to the next policy only when the current one admits nothing.

use serde::{Deserialize, Serialize};

use crate::scheduler::config::{RelaxedPolicy, SchedulerConfig};
use crate::scheduler::difficulty::DifficultyScore;

/// Which policy produced a selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum SelectionMode {
    Strict,
    Relaxed,
}

impl SelectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMode::Strict => "STRICT",
            SelectionMode::Relaxed => "RELAXED",
        }
    }
}

impl std::fmt::Display for SelectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Admission limits of one selection pass. `None` disables a limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintPolicy {
    pub mode: SelectionMode,
    pub max_new: Option<usize>,
    pub exact_new: Option<usize>,
    pub max_new_plus_intro: Option<usize>,
    pub max_learn: Option<usize>,
    pub max_length: Option<u32>,
    /// Whether phrases already shown to the user may be picked
    pub allow_repeats: bool,
}

impl ConstraintPolicy {
    /// Full load caps, never-shown phrases only.
    pub fn strict(config: &SchedulerConfig) -> Self {
        Self {
            mode: SelectionMode::Strict,
            max_new: Some(config.max_new),
            exact_new: None,
            max_new_plus_intro: Some(config.max_new_plus_intro),
            max_learn: Some(config.max_learn),
            max_length: None,
            allow_repeats: false,
        }
    }

    /// Fallback pass used when the strict pass admits nothing.
    pub fn relaxed(config: &SchedulerConfig) -> Self {
        let exact_new = match config.relaxed.policy {
            RelaxedPolicy::OneNew => Some(1),
            RelaxedPolicy::AnyNew => None,
        };
        Self {
            mode: SelectionMode::Relaxed,
            max_new: None,
            exact_new,
            max_new_plus_intro: None,
            max_learn: None,
            max_length: Some(config.relaxed.max_length),
            allow_repeats: true,
        }
    }

    /// Check the load and length limits. History is checked separately.
    pub fn admits(&self, score: &DifficultyScore, length: u32) -> bool {
        // A phrase without a NEW word introduces nothing
        if score.n_new == 0 {
            return false;
        }
        if self.max_new.is_some_and(|max| score.n_new > max) {
            return false;
        }
        if self.exact_new.is_some_and(|n| score.n_new != n) {
            return false;
        }
        if self
            .max_new_plus_intro
            .is_some_and(|max| score.n_new + score.n_intro > max)
        {
            return false;
        }
        if self.max_learn.is_some_and(|max| score.n_learn > max) {
            return false;
        }
        if self.max_length.is_some_and(|max| length > max) {
            return false;
        }
        true
    }
}

/// Strict then relaxed.
pub fn default_policies(config: &SchedulerConfig) -> Vec<ConstraintPolicy> {
    vec![ConstraintPolicy::strict(config), ConstraintPolicy::relaxed(config)]
}
