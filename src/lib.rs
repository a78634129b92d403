//! Phrase scheduler - introduces new vocabulary one phrase at a time
//!
//! Picks the easiest corpus phrase that teaches exactly one unknown word,
//! given a learner's per-word states, and records that exposure.

pub mod corpus;
pub mod error;
pub mod learner;
pub mod scheduler;
pub mod store;

pub use error::{Result, SchedulerError};
pub use scheduler::{IntroScheduler, NextPhrase, PhraseResult, SchedulerConfig};
