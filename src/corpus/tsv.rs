//! Tab-delimited corpus tables.
//!
//! File layouts:
//! - `words.tsv`:        `word_id  word  total_freq  rank` (with header)
//! - `phrases.tsv`:      `phrase_id  phrase_text  freq  cluster_size  length` (with header)
//! - `phrase_words.tsv`: `phrase_id  word_id  [position]` (no header)
//!
//! Malformed rows are logged and skipped; only an unreadable file is an error.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use csv::{ReaderBuilder, StringRecord};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::corpus::index::{CorpusIndex, LoadReport};
use crate::corpus::types::{PhraseRecord, PhraseWordLink, Word};
use crate::error::Result;

/// File names of the three corpus tables inside an index directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CorpusFiles {
    pub words_file: String,
    pub phrases_file: String,
    pub links_file: String,
}

impl Default for CorpusFiles {
    fn default() -> Self {
        Self {
            words_file: "words.tsv".to_string(),
            phrases_file: "phrases.tsv".to_string(),
            links_file: "phrase_words.tsv".to_string(),
        }
    }
}

impl CorpusFiles {
    pub fn words_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.words_file)
    }

    pub fn phrases_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.phrases_file)
    }

    pub fn links_path(&self, dir: &Path) -> PathBuf {
        dir.join(&self.links_file)
    }
}

/// Rows of one table plus the number of rows rejected while parsing.
#[derive(Debug)]
pub struct Rows<T> {
    pub rows: Vec<T>,
    pub skipped: usize,
}

/// Load all three tables from `dir` and build the index.
pub fn load_index_dir(dir: &Path, files: &CorpusFiles) -> Result<(CorpusIndex, LoadReport)> {
    let words = read_words(&files.words_path(dir))?;
    let phrases = read_phrases(&files.phrases_path(dir))?;
    let links = read_links(&files.links_path(dir))?;

    let (index, mut report) = CorpusIndex::build(words.rows, phrases.rows, links.rows);
    report.skipped_words += words.skipped;
    report.skipped_phrases += phrases.skipped;
    report.skipped_links += links.skipped;

    info!(
        "Loaded corpus from {}: {} words, {} phrases, {} links ({} rows skipped)",
        dir.display(),
        report.words,
        report.phrases,
        report.links,
        report.skipped()
    );
    Ok((index, report))
}

pub fn read_words(path: &Path) -> Result<Rows<Word>> {
    read_table(path, true, 4, |r| {
        Some(Word {
            id: field(r, 0)?,
            text: text_field(r, 1)?,
            total_freq: field(r, 2).filter(|&f: &u64| f > 0)?,
            rank: field(r, 3).filter(|&n: &u32| n >= 1)?,
        })
    })
}

pub fn read_phrases(path: &Path) -> Result<Rows<PhraseRecord>> {
    read_table(path, true, 5, |r| {
        Some(PhraseRecord {
            id: field(r, 0)?,
            text: text_field(r, 1)?,
            freq: field(r, 2).filter(|&f: &u64| f > 0)?,
            cluster_size: field(r, 3).filter(|&c: &u32| c >= 1)?,
            length: field(r, 4)?,
        })
    })
}

pub fn read_links(path: &Path) -> Result<Rows<PhraseWordLink>> {
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(file);

    let mut rows = Vec::new();
    let mut skipped = 0;
    for (line, result) in reader.records().enumerate() {
        let parsed = record_or_fault(result)?.and_then(|r| {
            let position = match r.len() {
                2 => None,
                3 => Some(field(&r, 2)?),
                _ => return None,
            };
            Some(PhraseWordLink {
                phrase_id: field(&r, 0)?,
                word_id: field(&r, 1)?,
                position,
            })
        });
        match parsed {
            Some(link) => rows.push(link),
            None => {
                warn!("{}:{}: skipping malformed link row", path.display(), line + 1);
                skipped += 1;
            }
        }
    }
    Ok(Rows { rows, skipped })
}

/// Read a plain word list, one word per line.
///
/// A missing file yields an empty list; blank lines are ignored.
pub fn read_word_list(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(File::open(path)?);
    let mut words = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let text = line.trim();
        if !text.is_empty() {
            words.push(text.to_string());
        }
    }
    Ok(words)
}

fn read_table<T>(
    path: &Path,
    has_headers: bool,
    columns: usize,
    parse: impl Fn(&StringRecord) -> Option<T>,
) -> Result<Rows<T>> {
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(has_headers)
        .flexible(true)
        .quoting(false)
        .from_reader(file);

    let mut rows = Vec::new();
    let mut skipped = 0;
    for (line, result) in reader.records().enumerate() {
        let parsed = record_or_fault(result)?
            .filter(|r| r.len() == columns)
            .and_then(|r| parse(&r));
        match parsed {
            Some(row) => rows.push(row),
            None => {
                // +2: one for the header, one for 1-based numbering
                warn!("{}:{}: skipping malformed row", path.display(), line + 2);
                skipped += 1;
            }
        }
    }
    Ok(Rows { rows, skipped })
}

/// I/O failures abort the load; anything else is a bad row.
fn record_or_fault(result: csv::Result<StringRecord>) -> Result<Option<StringRecord>> {
    match result {
        Ok(record) => Ok(Some(record)),
        Err(err) if matches!(err.kind(), csv::ErrorKind::Io(_)) => Err(err.into()),
        Err(_) => Ok(None),
    }
}

fn field<T: FromStr>(record: &StringRecord, i: usize) -> Option<T> {
    record.get(i)?.trim().parse().ok()
}

fn text_field(record: &StringRecord, i: usize) -> Option<String> {
    let text = record.get(i)?;
    if text.is_empty() { None } else { Some(text.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchedulerError;
    use std::fs;
    use tempfile::TempDir;

    fn write_corpus(dir: &Path) {
        fs::write(
            dir.join("words.tsv"),
            "word_id\tword\ttotal_freq\trank\n0\tel\t500\t1\n1\tgato\t300\t2\n2\tcome\tmany\t3\n3\tperro\t100\n",
        )
        .unwrap();
        fs::write(
            dir.join("phrases.tsv"),
            "phrase_id\tphrase_text\tfreq\tcluster_size\tlength\n0\tel gato\t100\t2\t2\n1\tbroken\n",
        )
        .unwrap();
        fs::write(dir.join("phrase_words.tsv"), "0\t0\n0\t1\nx\t1\n").unwrap();
    }

    #[test]
    fn test_load_index_dir_skips_bad_rows() {
        let temp = TempDir::new().unwrap();
        write_corpus(temp.path());

        let (index, report) = load_index_dir(temp.path(), &CorpusFiles::default()).unwrap();
        assert_eq!(report.words, 2);
        assert_eq!(report.skipped_words, 2);
        assert_eq!(report.phrases, 1);
        assert_eq!(report.skipped_phrases, 1);
        assert_eq!(report.links, 2);
        assert_eq!(report.skipped_links, 1);

        let phrase = index.phrase(0).unwrap();
        assert_eq!(phrase.word_ids, vec![0, 1]);
        assert_eq!(phrase.cluster_size, 2);
    }

    #[test]
    fn test_missing_file_is_error() {
        let temp = TempDir::new().unwrap();
        assert!(load_index_dir(temp.path(), &CorpusFiles::default()).is_err());
    }

    #[test]
    fn test_links_with_positions() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("links.tsv");
        fs::write(&path, "0\t1\t1\n0\t0\t0\n1\t2\t0\t9\n").unwrap();

        let links = read_links(&path).unwrap();
        assert_eq!(links.rows.len(), 2);
        assert_eq!(links.skipped, 1);
        assert_eq!(links.rows[0].position, Some(1));
    }

    #[test]
    fn test_zero_frequency_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("phrases.tsv");
        fs::write(&path, "h\th\th\th\th\n0\tuno\t0\t1\t1\n1\tdos\t5\t1\t1\n").unwrap();

        let phrases = read_phrases(&path).unwrap();
        assert_eq!(phrases.rows.len(), 1);
        assert_eq!(phrases.rows[0].text, "dos");
        assert_eq!(phrases.skipped, 1);
    }

    #[test]
    fn test_read_word_list() {
        let temp = TempDir::new().unwrap();
        let list = temp.path().join("known.txt");
        fs::write(&list, "gato\n\n  el \ncasa\n").unwrap();
        assert_eq!(read_word_list(&list).unwrap(), vec!["gato", "el", "casa"]);

        let missing = temp.path().join("missing.txt");
        assert!(read_word_list(&missing).unwrap().is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn test_unreadable_table_is_error() {
        let temp = TempDir::new().unwrap();
        // A directory opens but fails on the first read
        let err = read_words(temp.path()).unwrap_err();
        assert!(matches!(err, SchedulerError::Csv(_)));
        assert!(matches!(read_links(temp.path()), Err(SchedulerError::Csv(_))));
    }

    #[test]
    fn test_invalid_utf8_row_is_skipped() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("words.tsv");
        fs::write(&path, b"h\th\th\th\n0\tel\t5\t1\n1\t\xff\xfe\t4\t2\n").unwrap();

        let words = read_words(&path).unwrap();
        assert_eq!(words.rows.len(), 1);
        assert_eq!(words.skipped, 1);
    }
}
