//! SQLite-backed learner store.
//!
//! Corpus tables and per-user tables live in one database:
//! - `words`, `phrases`, `phrase_words`: the imported corpus
//! - `user_word_state`: one row per (user, word) once introduced
//! - `user_phrase_history`: append-only presentation log
//!
//! Write sessions run inside an IMMEDIATE transaction, so the reads used
//! for selection and the writes of the exposure commit form one unit and
//! concurrent writers for the database serialize.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::info;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};

use crate::corpus::{CorpusFiles, CorpusIndex, LoadReport, Phrase, PhraseId, Word, WordId, load_index_dir};
use crate::error::{Result, SchedulerError};
use crate::learner::{PhraseHistoryEntry, StateCounts, StateMap, UserId, WordState, WordStateKind};
use crate::store::traits::{CandidateStore, ExposureSink, LearnerStore};

/// Default time to wait on a locked database before reporting a conflict.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Learner store persisted in a SQLite database.
pub struct SqliteStore {
    /// Database file, `None` for in-memory databases
    path: Option<PathBuf>,

    db: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").field("path", &self.path).finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open or create a store at the given database file.
    pub fn open(path: &Path, busy_timeout_ms: u64) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let db = Connection::open(path)?;
        db.busy_timeout(Duration::from_millis(busy_timeout_ms))?;
        let _: String = db.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        Self::init(db, Some(path.to_path_buf()))
    }

    /// Open a private in-memory database.
    ///
    /// Useful for testing.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(db: Connection, path: Option<PathBuf>) -> Result<Self> {
        db.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::init_schema(&db)?;
        Ok(Self {
            path,
            db: Mutex::new(db),
        })
    }

    /// Initialize the SQLite schema.
    fn init_schema(db: &Connection) -> Result<()> {
        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS words (
                id          INTEGER PRIMARY KEY,
                word        TEXT NOT NULL UNIQUE,
                total_freq  INTEGER NOT NULL,
                rank        INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS phrases (
                id           INTEGER PRIMARY KEY,
                phrase       TEXT NOT NULL,
                freq         INTEGER NOT NULL,
                cluster_size INTEGER NOT NULL,
                length       INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS phrase_words (
                phrase_id  INTEGER NOT NULL REFERENCES phrases(id),
                word_id    INTEGER NOT NULL REFERENCES words(id),
                position   INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (phrase_id, word_id, position)
            );

            CREATE INDEX IF NOT EXISTS idx_words_rank ON words(rank, id);
            CREATE INDEX IF NOT EXISTS idx_phrase_words_word ON phrase_words(word_id);
            CREATE INDEX IF NOT EXISTS idx_phrase_words_phrase ON phrase_words(phrase_id);

            CREATE TABLE IF NOT EXISTS user_word_state (
                user_id     INTEGER NOT NULL,
                word_id     INTEGER NOT NULL REFERENCES words(id),
                state       TEXT NOT NULL CHECK (state IN ('NEW', 'INTRO', 'LEARN', 'KNOWN', 'MATURE')),
                reps        INTEGER NOT NULL DEFAULT 0,
                lapses      INTEGER NOT NULL DEFAULT 0,
                last_result TEXT,
                last_seen   TEXT,
                next_due    TEXT,
                PRIMARY KEY (user_id, word_id)
            );

            CREATE INDEX IF NOT EXISTS idx_user_word_state_state ON user_word_state(user_id, state);

            CREATE TABLE IF NOT EXISTS user_phrase_history (
                user_id    INTEGER NOT NULL,
                phrase_id  INTEGER NOT NULL REFERENCES phrases(id),
                shown_at   TEXT NOT NULL,
                result     TEXT NOT NULL,
                PRIMARY KEY (user_id, phrase_id, shown_at)
            );

            CREATE INDEX IF NOT EXISTS idx_user_phrase_history_user_phrase
                ON user_phrase_history(user_id, phrase_id);
            "#,
        )?;

        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Load the tab-delimited corpus in `dir`, replacing the stored corpus.
    pub fn import_dir(&self, dir: &Path, files: &CorpusFiles) -> Result<LoadReport> {
        let (index, report) = load_index_dir(dir, files)?;
        self.import_index(&index)?;
        Ok(report)
    }

    /// Replace the stored corpus with the contents of `index`.
    ///
    /// User tables reference corpus ids and are cleared as well.
    pub fn import_index(&self, index: &CorpusIndex) -> Result<()> {
        let mut db = self.lock()?;
        let tx = db.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute_batch(
            r#"
            DELETE FROM user_phrase_history;
            DELETE FROM user_word_state;
            DELETE FROM phrase_words;
            DELETE FROM phrases;
            DELETE FROM words;
            "#,
        )?;

        {
            let mut insert_word =
                tx.prepare("INSERT INTO words (id, word, total_freq, rank) VALUES (?1, ?2, ?3, ?4)")?;
            for word in index.words_by_rank() {
                insert_word.execute(params![word.id, word.text, freq_to_sql(word.total_freq)?, word.rank])?;
            }

            let mut insert_phrase = tx.prepare(
                "INSERT INTO phrases (id, phrase, freq, cluster_size, length) VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            let mut insert_link =
                tx.prepare("INSERT INTO phrase_words (phrase_id, word_id, position) VALUES (?1, ?2, ?3)")?;
            for phrase in index.phrases() {
                insert_phrase.execute(params![
                    phrase.id,
                    phrase.text,
                    freq_to_sql(phrase.freq)?,
                    phrase.cluster_size,
                    phrase.length
                ])?;
                for (position, word_id) in phrase.word_ids.iter().enumerate() {
                    insert_link.execute(params![phrase.id, word_id, position as u32])?;
                }
            }
        }

        tx.commit()?;
        info!(
            "Imported corpus: {} words, {} phrases",
            index.word_count(),
            index.phrase_count()
        );
        Ok(())
    }

    /// Refuse to run against a database without a corpus.
    pub fn ensure_corpus(&self) -> Result<()> {
        match self.word_count()? {
            0 => Err(SchedulerError::EmptyCorpus(match &self.path {
                Some(path) => format!("no words in {}; run import first", path.display()),
                None => "no words in database; run import first".to_string(),
            })),
            _ => Ok(()),
        }
    }

    /// Get the stored state row for a word, if any.
    pub fn word_state(&self, user: UserId, word_id: WordId) -> Result<Option<WordState>> {
        let db = self.lock()?;
        let row = db
            .query_row(
                r#"
                SELECT state, reps, lapses, last_result, last_seen, next_due
                FROM user_word_state WHERE user_id = ?1 AND word_id = ?2
                "#,
                params![user, word_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((state, reps, lapses, last_result, last_seen, next_due)) = row else {
            return Ok(None);
        };
        Ok(Some(WordState {
            state: state.parse()?,
            reps,
            lapses,
            last_result,
            last_seen,
            next_due,
        }))
    }

    /// Get the user's exposure log, oldest first.
    pub fn history(&self, user: UserId) -> Result<Vec<PhraseHistoryEntry>> {
        let db = self.lock()?;
        let mut stmt = db.prepare(
            "SELECT phrase_id, shown_at, result FROM user_phrase_history WHERE user_id = ?1 ORDER BY shown_at",
        )?;
        let rows = stmt.query_map([user], |row| {
            Ok(PhraseHistoryEntry {
                phrase_id: row.get(0)?,
                shown_at: row.get(1)?,
                result: row.get(2)?,
            })
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db.lock().map_err(|e| SchedulerError::Storage(e.to_string()))
    }
}

impl LearnerStore for SqliteStore {
    fn read<R>(&self, user: UserId, f: impl FnOnce(&dyn CandidateStore) -> Result<R>) -> Result<R> {
        let mut db = self.lock()?;
        let tx = db.transaction_with_behavior(TransactionBehavior::Deferred)?;
        let result = f(&SqliteSession { db: &tx, user })?;
        tx.commit()?;
        Ok(result)
    }

    fn write<R>(&self, user: UserId, f: impl FnOnce(&mut dyn ExposureSink) -> Result<R>) -> Result<R> {
        let mut db = self.lock()?;
        // Dropping the transaction on error rolls it back
        let tx = db.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = f(&mut SqliteSession { db: &tx, user })?;
        tx.commit()?;
        Ok(result)
    }

    fn seed_states(&self, user: UserId, states: &[(WordId, WordStateKind)]) -> Result<()> {
        let mut db = self.lock()?;
        let tx = db.transaction_with_behavior(TransactionBehavior::Immediate)?;
        {
            let mut upsert = tx.prepare(
                r#"
                INSERT INTO user_word_state (user_id, word_id, state, reps, lapses)
                VALUES (?1, ?2, ?3, 0, 0)
                ON CONFLICT (user_id, word_id) DO UPDATE SET state = excluded.state
                "#,
            )?;
            for &(word_id, kind) in states {
                upsert.execute(params![user, word_id, kind.as_str()]).map_err(|e| {
                    match e.sqlite_error_code() {
                        Some(rusqlite::ErrorCode::ConstraintViolation) => SchedulerError::WordNotFound(word_id),
                        _ => e.into(),
                    }
                })?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn word_count(&self) -> Result<usize> {
        let db = self.lock()?;
        count_words(&db)
    }
}

struct SqliteSession<'a> {
    db: &'a Connection,
    user: UserId,
}

impl CandidateStore for SqliteSession<'_> {
    fn unknown_pool(&self, limit: usize) -> Result<Vec<WordId>> {
        let mut stmt = self.db.prepare_cached(
            r#"
            SELECT w.id FROM words w
            LEFT JOIN user_word_state s ON s.word_id = w.id AND s.user_id = ?1
            WHERE s.word_id IS NULL
            ORDER BY w.rank, w.id
            LIMIT ?2
            "#,
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![self.user, limit], |row| row.get(0))?;
        collect(rows)
    }

    fn phrases_containing(&self, word_id: WordId) -> Result<Vec<PhraseId>> {
        let mut stmt = self
            .db
            .prepare_cached("SELECT DISTINCT phrase_id FROM phrase_words WHERE word_id = ?1 ORDER BY phrase_id")?;
        let rows = stmt.query_map([word_id], |row| row.get(0))?;
        collect(rows)
    }

    fn phrase(&self, phrase_id: PhraseId) -> Result<Option<Phrase>> {
        let found = self
            .db
            .prepare_cached("SELECT id, phrase, freq, cluster_size, length FROM phrases WHERE id = ?1")?
            .query_row([phrase_id], |row| {
                Ok((
                    row.get(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get(3)?,
                    row.get(4)?,
                ))
            })
            .optional()?;

        let Some((id, text, freq, cluster_size, length)) = found else {
            return Ok(None);
        };
        let mut phrase = Phrase {
            id,
            text,
            freq: freq_from_sql(freq)?,
            cluster_size,
            length,
            word_ids: Vec::new(),
        };
        let mut stmt = self
            .db
            .prepare_cached("SELECT word_id FROM phrase_words WHERE phrase_id = ?1 ORDER BY position")?;
        let rows = stmt.query_map([phrase_id], |row| row.get(0))?;
        phrase.word_ids = collect(rows)?;
        Ok(Some(phrase))
    }

    fn word(&self, word_id: WordId) -> Result<Option<Word>> {
        let word = self
            .db
            .prepare_cached("SELECT id, word, total_freq, rank FROM words WHERE id = ?1")?
            .query_row([word_id], |row| {
                Ok((
                    row.get(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get(3)?,
                ))
            })
            .optional()?;

        let Some((id, text, total_freq, rank)) = word else {
            return Ok(None);
        };
        Ok(Some(Word {
            id,
            text,
            total_freq: freq_from_sql(total_freq)?,
            rank,
        }))
    }

    fn word_id(&self, text: &str) -> Result<Option<WordId>> {
        let id = self
            .db
            .prepare_cached("SELECT id FROM words WHERE word = ?1")?
            .query_row([text], |row| row.get(0))
            .optional()?;
        Ok(id)
    }

    fn word_states(&self) -> Result<StateMap> {
        let mut stmt = self
            .db
            .prepare_cached("SELECT word_id, state FROM user_word_state WHERE user_id = ?1")?;
        let rows = stmt.query_map([self.user], |row| {
            Ok((row.get::<_, WordId>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut states = StateMap::new();
        for row in rows {
            let (word_id, state) = row?;
            states.insert(word_id, state.parse()?);
        }
        Ok(states)
    }

    fn was_shown(&self, phrase_id: PhraseId) -> Result<bool> {
        let shown = self
            .db
            .prepare_cached(
                "SELECT EXISTS(SELECT 1 FROM user_phrase_history WHERE user_id = ?1 AND phrase_id = ?2)",
            )?
            .query_row(params![self.user, phrase_id], |row| row.get(0))?;
        Ok(shown)
    }

    fn state_counts(&self) -> Result<StateCounts> {
        let total = count_words(self.db)?;
        let mut stmt = self
            .db
            .prepare_cached("SELECT state, COUNT(*) FROM user_word_state WHERE user_id = ?1 GROUP BY state")?;
        let rows = stmt.query_map([self.user], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut counts = StateCounts::default();
        let mut stored = 0;
        for row in rows {
            let (state, n) = row?;
            let n = n as usize;
            counts.add(state.parse()?, n);
            stored += n;
        }
        counts.new += total.saturating_sub(stored);
        Ok(counts)
    }
}

impl ExposureSink for SqliteSession<'_> {
    fn append_history(&mut self, entry: &PhraseHistoryEntry) -> Result<()> {
        self.db
            .prepare_cached(
                r#"
                INSERT INTO user_phrase_history (user_id, phrase_id, shown_at, result)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT (user_id, phrase_id, shown_at) DO NOTHING
                "#,
            )?
            .execute(params![self.user, entry.phrase_id, entry.shown_at, entry.result])?;
        Ok(())
    }

    fn introduce_word(&mut self, word_id: WordId, seen_at: DateTime<Utc>) -> Result<bool> {
        let inserted = self
            .db
            .prepare_cached(
                r#"
                INSERT INTO user_word_state (user_id, word_id, state, reps, lapses, last_result, last_seen)
                VALUES (?1, ?2, 'INTRO', 0, 0, NULL, ?3)
                ON CONFLICT (user_id, word_id) DO NOTHING
                "#,
            )?
            .execute(params![self.user, word_id, seen_at])?;
        Ok(inserted == 1)
    }
}

fn count_words(db: &Connection) -> Result<usize> {
    let count: i64 = db.query_row("SELECT COUNT(*) FROM words", [], |row| row.get(0))?;
    Ok(count as usize)
}

/// SQLite integers are signed 64-bit; frequencies above `i64::MAX` cannot be stored.
fn freq_to_sql(freq: u64) -> Result<i64> {
    i64::try_from(freq)
        .map_err(|_| SchedulerError::Storage(format!("frequency {} exceeds the SQLite integer range", freq)))
}

fn freq_from_sql(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| SchedulerError::Storage(format!("negative frequency {} in database", value)))
}

fn collect<T>(rows: impl Iterator<Item = rusqlite::Result<T>>) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}
