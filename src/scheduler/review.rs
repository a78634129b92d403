//! Review path hook.
//!
//! Word state transitions past INTRO belong to the review scheduler. This
//! core only accepts the call and hands it to a `ReviewHandler`.

use log::info;

use crate::corpus::PhraseId;
use crate::error::Result;
use crate::learner::{AnswerResult, UserId};

pub trait ReviewHandler: Send + Sync {
    fn process_answer(&self, user: UserId, phrase_id: PhraseId, result: AnswerResult) -> Result<()>;
}

/// Logs answers and changes nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingReview;

impl ReviewHandler for LoggingReview {
    fn process_answer(&self, user: UserId, phrase_id: PhraseId, result: AnswerResult) -> Result<()> {
        info!("Answer received: user={} phrase={} result={}", user, phrase_id, result);
        Ok(())
    }
}
