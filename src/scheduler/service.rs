//! Request-level facade over a `LearnerStore`.
//!
//! `get_next_phrase` runs selection and the exposure commit inside one
//! write session, so two requests for the same user cannot both promote
//! the same target. Write conflicts are retried from the start.

use chrono::Utc;
use log::{debug, info, warn};

use crate::corpus::{PhraseId, WordId};
use crate::error::Result;
use crate::learner::{AnswerResult, StateCounts, UserId, WordStateKind};
use crate::scheduler::config::SchedulerConfig;
use crate::scheduler::exposure::{ExposureOutcome, record_exposure};
use crate::scheduler::review::{LoggingReview, ReviewHandler};
use crate::scheduler::select::{NextPhrase, Selector};
use crate::store::LearnerStore;

/// Word lists used to seed a learner's state.
#[derive(Debug, Clone, Default)]
pub struct WordLists {
    pub known: Vec<String>,
    pub intro: Vec<String>,
    pub learn: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub seeded: usize,
    /// Words not found in the corpus
    pub ignored: usize,
}

pub struct IntroScheduler<S> {
    store: S,
    config: SchedulerConfig,
    selector: Selector,
    review: Box<dyn ReviewHandler>,
}

impl<S: std::fmt::Debug> std::fmt::Debug for IntroScheduler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntroScheduler")
            .field("store", &self.store)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S: LearnerStore> IntroScheduler<S> {
    pub fn new(store: S, config: SchedulerConfig) -> Self {
        let selector = Selector::new(&config);
        Self {
            store,
            config,
            selector,
            review: Box::new(LoggingReview),
        }
    }

    pub fn with_review_handler(mut self, handler: impl ReviewHandler + 'static) -> Self {
        self.review = Box::new(handler);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Select the next phrase and record its exposure.
    pub fn get_next_phrase(&self, user: UserId) -> Result<NextPhrase> {
        self.commit_next(user, &self.selector, self.config.commit_retries)
    }

    /// Select the next phrase without writing anything.
    pub fn preview_next_phrase(&self, user: UserId) -> Result<NextPhrase> {
        let next = self.store.read(user, |s| self.selector.select(s))?;
        log_outcome(user, &next, false);
        Ok(next)
    }

    /// Select with per-call tunables; `record` false is preview mode.
    pub fn next_phrase_with(&self, user: UserId, config: &SchedulerConfig, record: bool) -> Result<NextPhrase> {
        let selector = Selector::new(config);
        if record {
            return self.commit_next(user, &selector, config.commit_retries);
        }
        let next = self.store.read(user, |s| selector.select(s))?;
        log_outcome(user, &next, false);
        Ok(next)
    }

    /// Record an exposure chosen outside `get_next_phrase`.
    pub fn record_exposure(&self, user: UserId, phrase_id: PhraseId, word_id: WordId) -> Result<ExposureOutcome> {
        self.with_retries(self.config.commit_retries, || {
            self.store
                .write(user, |s| record_exposure(s, phrase_id, word_id, Utc::now()))
        })
    }

    pub fn process_answer(&self, user: UserId, phrase_id: PhraseId, result: AnswerResult) -> Result<()> {
        self.review.process_answer(user, phrase_id, result)
    }

    pub fn state_counts(&self, user: UserId) -> Result<StateCounts> {
        self.store.read(user, |s| s.state_counts())
    }

    /// Seed word states from lists; INTRO wins over LEARN, LEARN over KNOWN.
    pub fn seed_word_lists(&self, user: UserId, lists: &WordLists) -> Result<SeedReport> {
        let ordered = [
            (WordStateKind::Known, &lists.known),
            (WordStateKind::Learn, &lists.learn),
            (WordStateKind::Intro, &lists.intro),
        ];

        let (states, ignored) = self.store.read(user, |s| {
            let mut states = Vec::new();
            let mut ignored = 0;
            for (kind, words) in ordered {
                for text in words {
                    match s.word_id(text)? {
                        Some(word_id) => states.push((word_id, kind)),
                        None => {
                            debug!("Ignoring {:?}: not in corpus", text);
                            ignored += 1;
                        }
                    }
                }
            }
            Ok((states, ignored))
        })?;

        self.store.seed_states(user, &states)?;
        info!("Seeded {} word states for user {} ({} ignored)", states.len(), user, ignored);
        Ok(SeedReport {
            seeded: states.len(),
            ignored,
        })
    }

    fn commit_next(&self, user: UserId, selector: &Selector, retries: u32) -> Result<NextPhrase> {
        let next = self.with_retries(retries, || {
            self.store.write(user, |s| {
                let next = selector.select(&*s)?;
                if let NextPhrase::Found(result) = &next {
                    record_exposure(s, result.phrase_id, result.target_word_id, Utc::now())?;
                }
                Ok(next)
            })
        })?;
        log_outcome(user, &next, true);
        Ok(next)
    }

    fn with_retries<R>(&self, retries: u32, mut op: impl FnMut() -> Result<R>) -> Result<R> {
        let mut attempt = 0;
        loop {
            match op() {
                Err(e) if e.is_retryable() && attempt < retries => {
                    attempt += 1;
                    warn!("Retrying after conflict (attempt {}/{}): {}", attempt, retries, e);
                }
                other => return other,
            }
        }
    }
}

fn log_outcome(user: UserId, next: &NextPhrase, recorded: bool) {
    match next {
        NextPhrase::Found(result) => info!(
            "Next phrase for user {}: {} {:?} target={:?} cost={:.3} recorded={}",
            user, result.mode, result.phrase_text, result.target_word_text, result.cost, recorded
        ),
        NextPhrase::NoCandidate => info!("No candidate phrase for user {}", user),
    }
}
