//! Introduction scheduler.
//!
//! This module provides:
//! - **Difficulty scoring**: cost of a phrase given the learner's word states
//! - **Constraint policies**: ordered strict/relaxed admission rules
//! - **Selector**: cheapest admissible phrase over the unknown-word pool
//! - **Exposure recording**: history row plus first-exposure INTRO promotion
//! - **IntroScheduler**: per-request facade with conflict retries
//!
//! # Example
//!
//! ```ignore
//! use phrase_scheduler::scheduler::{IntroScheduler, NextPhrase, SchedulerConfig};
//! use phrase_scheduler::store::SqliteStore;
//!
//! let store = SqliteStore::open(Path::new("srs.db"), 5000)?;
//! let scheduler = IntroScheduler::new(store, SchedulerConfig::default());
//!
//! match scheduler.get_next_phrase(user_id)? {
//!     NextPhrase::Found(result) => println!("{}", result.phrase_text),
//!     NextPhrase::NoCandidate => println!("nothing new to introduce"),
//! }
//! ```

mod config;
mod difficulty;
mod exposure;
mod policy;
mod review;
mod select;
mod service;

pub use config::{DifficultyWeights, RelaxedConfig, RelaxedPolicy, SchedulerConfig};
pub use difficulty::{DifficultyScore, score_phrase};
pub use exposure::{ExposureOutcome, record_exposure};
pub use policy::{ConstraintPolicy, SelectionMode, default_policies};
pub use review::{LoggingReview, ReviewHandler};
pub use select::{NextPhrase, PhraseResult, Selector};
pub use service::{IntroScheduler, SeedReport, WordLists};
