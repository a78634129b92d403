//! Static word/phrase corpus.
//!
//! The corpus is built offline and consumed read-only:
//! - **types**: Word, PhraseRecord, Phrase, PhraseWordLink
//! - **index**: immutable `CorpusIndex` keyed by dense ids
//! - **tsv**: tab-delimited table readers

mod index;
mod tsv;
mod types;

pub use index::{CorpusIndex, LoadReport};
pub use tsv::{CorpusFiles, Rows, load_index_dir, read_links, read_phrases, read_word_list, read_words};
pub use types::{Phrase, PhraseId, PhraseRecord, PhraseWordLink, Word, WordId};

#[cfg(test)]
pub(crate) use index::tests::{links as test_links, record as test_record, sample_index, word as test_word};
