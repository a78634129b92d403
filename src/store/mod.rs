//! Learner state storage.
//!
//! Two implementations of the same capability traits:
//! - **MemoryStore**: in-memory snapshot over a loaded `CorpusIndex`
//! - **SqliteStore**: corpus and learner tables in one SQLite database
//!
//! # Example
//!
//! ```ignore
//! use phrase_scheduler::store::{LearnerStore, SqliteStore};
//!
//! let store = SqliteStore::open(Path::new("srs.db"), 5000)?;
//! let pool = store.read(user_id, |s| s.unknown_pool(200))?;
//! ```

mod memory;
mod sqlite;
mod traits;

pub use memory::{LearnerState, MemoryStore};
pub use sqlite::{DEFAULT_BUSY_TIMEOUT_MS, SqliteStore};
pub use traits::{CandidateStore, ExposureSink, LearnerStore};
