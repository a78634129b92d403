//! Exposure recording: log the presentation and promote the target word.

use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;

use crate::corpus::{PhraseId, WordId};
use crate::error::{Result, SchedulerError};
use crate::learner::PhraseHistoryEntry;
use crate::store::ExposureSink;

/// What `record_exposure` changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExposureOutcome {
    pub phrase_id: PhraseId,
    pub word_id: WordId,
    pub shown_at: DateTime<Utc>,
    /// False when the word already had a state row
    pub introduced: bool,
}

/// Append a history row and create the target's INTRO row if absent.
///
/// Must run inside one write session so both changes commit together.
pub fn record_exposure<S: ExposureSink + ?Sized>(
    sink: &mut S,
    phrase_id: PhraseId,
    word_id: WordId,
    now: DateTime<Utc>,
) -> Result<ExposureOutcome> {
    let phrase = sink.phrase(phrase_id)?.ok_or(SchedulerError::PhraseNotFound(phrase_id))?;
    if !phrase.contains(word_id) {
        return Err(SchedulerError::InvalidTarget {
            phrase: phrase_id,
            word: word_id,
        });
    }

    sink.append_history(&PhraseHistoryEntry::shown(phrase_id, now))?;
    let introduced = sink.introduce_word(word_id, now)?;
    info!(
        "Recorded exposure: phrase={} word={} introduced={}",
        phrase_id, word_id, introduced
    );

    Ok(ExposureOutcome {
        phrase_id,
        word_id,
        shown_at: now,
        introduced,
    })
}
