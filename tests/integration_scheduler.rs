//! Introduction scheduler integration tests
//!
//! Drives selection and exposure recording end to end against both the
//! in-memory and the SQLite learner stores.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use phrase_scheduler::corpus::{CorpusFiles, CorpusIndex, PhraseRecord, PhraseWordLink, Word, load_index_dir};
use phrase_scheduler::error::Result;
use phrase_scheduler::learner::{UserId, WordStateKind};
use phrase_scheduler::scheduler::{IntroScheduler, NextPhrase, SchedulerConfig, SelectionMode, WordLists};
use phrase_scheduler::store::{LearnerStore, MemoryStore, SqliteStore};
use tempfile::TempDir;

const USER: UserId = 1;

const WORDS_TSV: &str = "word_id\tword\ttotal_freq\trank
0\tel\t500\t1
1\tgato\t300\t2
2\tcome\t200\t3
3\tperro\t100\t4
4\tbebe\t90\t5
5\tagua\t80\t6
";

const PHRASES_TSV: &str = "phrase_id\tphrase_text\tfreq\tcluster_size\tlength
0\tel gato come\t100\t3\t3
1\tel perro\t40\t1\t2
2\tel gato bebe agua\t30\t2\t4
3\tperro bebe\t20\t1\t2
4\tel perro bebe agua\t10\t1\t4
";

const LINKS_TSV: &str = "0\t0\t0
0\t1\t1
0\t2\t2
1\t0\t0
1\t3\t1
2\t0\t0
2\t1\t1
2\t4\t2
2\t5\t3
3\t3\t0
3\t4\t1
4\t0\t0
4\t3\t1
4\t4\t2
4\t5\t3
";

fn write_corpus(dir: &Path) {
    fs::write(dir.join("words.tsv"), WORDS_TSV).unwrap();
    fs::write(dir.join("phrases.tsv"), PHRASES_TSV).unwrap();
    fs::write(dir.join("phrase_words.tsv"), LINKS_TSV).unwrap();
}

fn memory_scheduler(dir: &Path) -> IntroScheduler<MemoryStore> {
    let (index, report) = load_index_dir(dir, &CorpusFiles::default()).unwrap();
    assert_eq!(report.skipped(), 0);
    IntroScheduler::new(MemoryStore::new(Arc::new(index)), SchedulerConfig::default())
}

fn sqlite_scheduler(dir: &Path) -> IntroScheduler<SqliteStore> {
    let store = SqliteStore::open(&dir.join("srs.db"), 5000).unwrap();
    store.import_dir(dir, &CorpusFiles::default()).unwrap();
    IntroScheduler::new(store, SchedulerConfig::default())
}

fn word(id: u32, text: &str, rank: u32) -> Word {
    Word {
        id,
        text: text.to_string(),
        total_freq: 1000 - rank as u64,
        rank,
    }
}

fn phrase(id: u32, text: &str, freq: u64, word_ids: &[u32]) -> (PhraseRecord, Vec<PhraseWordLink>) {
    let record = PhraseRecord {
        id,
        text: text.to_string(),
        freq,
        cluster_size: 1,
        length: word_ids.len() as u32,
    };
    let links = word_ids
        .iter()
        .enumerate()
        .map(|(pos, &word_id)| PhraseWordLink {
            phrase_id: id,
            word_id,
            position: Some(pos as u32),
        })
        .collect();
    (record, links)
}

/// `el gato come` only, every word NEW.
fn single_phrase_index(extra: Option<(u32, &str, u64, &[u32])>, words: Vec<Word>) -> CorpusIndex {
    let (record, mut links) = phrase(0, "el gato come", 100, &[0, 1, 2]);
    let mut records = vec![record];
    if let Some((id, text, freq, ids)) = extra {
        let (r, l) = phrase(id, text, freq, ids);
        records.push(r);
        links.extend(l);
    }
    let (index, report) = CorpusIndex::build(words, records, links);
    assert_eq!(report.skipped(), 0);
    index
}

fn lists(known: &[&str], intro: &[&str], learn: &[&str]) -> WordLists {
    let owned = |words: &[&str]| -> Vec<String> { words.iter().map(|w| w.to_string()).collect() };
    WordLists {
        known: owned(known),
        intro: owned(intro),
        learn: owned(learn),
    }
}

fn assert_all_new_is_no_candidate<S: LearnerStore>(scheduler: &IntroScheduler<S>) {
    assert_eq!(scheduler.get_next_phrase(USER).unwrap(), NextPhrase::NoCandidate);
    assert_eq!(scheduler.state_counts(USER).unwrap().new, 3);
}

/// Integration test: a phrase made only of NEW words is never offered
#[test]
fn test_all_new_phrase_yields_no_candidate() {
    let words = vec![word(0, "el", 1), word(1, "gato", 2), word(2, "come", 3)];

    let memory = IntroScheduler::new(
        MemoryStore::new(Arc::new(single_phrase_index(None, words.clone()))),
        SchedulerConfig::default(),
    );
    assert_all_new_is_no_candidate(&memory);

    let sqlite = SqliteStore::open_in_memory().unwrap();
    sqlite.import_index(&single_phrase_index(None, words)).unwrap();
    assert_all_new_is_no_candidate(&IntroScheduler::new(sqlite, SchedulerConfig::default()));
}

fn assert_strict_scenario<S: LearnerStore>(scheduler: &IntroScheduler<S>) {
    scheduler
        .seed_word_lists(USER, &lists(&["perro"], &["el"], &["come"]))
        .unwrap();

    let next = scheduler.preview_next_phrase(USER).unwrap();
    let result = next.found().expect("strict pass should admit el gato come");
    assert_eq!(result.phrase_id, 0);
    assert_eq!(result.phrase_text, "el gato come");
    assert_eq!(result.target_word_text, "gato");
    assert_eq!(result.mode, SelectionMode::Strict);
    assert_eq!((result.n_new, result.n_intro, result.n_learn), (1, 1, 1));
    assert_eq!(format!("{:.2}", result.cost), "3.99");
    assert_eq!((result.freq, result.length), (100, 3));
}

/// Integration test: one NEW, one INTRO and one LEARN word pass the strict caps
#[test]
fn test_strict_scenario_both_backends() {
    let words = vec![
        word(0, "el", 1),
        word(1, "gato", 2),
        word(2, "come", 3),
        word(3, "perro", 4),
    ];
    let perro_ids: &[u32] = &[0, 3];
    let extra = Some((1, "el perro", 40, perro_ids));

    let memory = IntroScheduler::new(
        MemoryStore::new(Arc::new(single_phrase_index(extra, words.clone()))),
        SchedulerConfig::default(),
    );
    assert_strict_scenario(&memory);

    let sqlite = SqliteStore::open_in_memory().unwrap();
    sqlite.import_index(&single_phrase_index(extra, words)).unwrap();
    assert_strict_scenario(&IntroScheduler::new(sqlite, SchedulerConfig::default()));
}

fn assert_cold_start<S: LearnerStore>(scheduler: &IntroScheduler<S>) -> Result<()> {
    let first = scheduler.get_next_phrase(USER)?;
    let result = first.found().expect("one-word phrase fits the strict caps");
    assert_eq!(result.mode, SelectionMode::Strict);
    assert_eq!(result.phrase_text, "hola");
    assert_eq!(result.length, 1);
    assert_eq!(result.n_new, 1);
    // Pool is limited to the top-ranked unknown word
    assert_eq!(result.target_word_text, "hola");
    assert_eq!(result.target_word_id, 0);

    let second = scheduler.get_next_phrase(USER)?;
    let next = second.found().expect("hola is INTRO now");
    assert_eq!(next.mode, SelectionMode::Strict);
    assert_eq!(next.phrase_text, "hola gato");
    assert_eq!(next.target_word_text, "gato");
    assert_eq!((next.n_new, next.n_intro), (1, 1));
    Ok(())
}

/// Integration test: with no word states the strict pass picks a one-word phrase
#[test]
fn test_cold_start_picks_single_word_phrase() -> Result<()> {
    let words = vec![word(0, "hola", 1), word(1, "gato", 2)];
    let (first, mut links) = phrase(0, "hola gato", 80, &[0, 1]);
    let (second, single) = phrase(1, "hola", 20, &[0]);
    links.extend(single);
    let (index, report) = CorpusIndex::build(words, vec![first, second], links);
    assert_eq!(report.skipped(), 0);

    let config = SchedulerConfig {
        top_unknown_candidates: 1,
        ..SchedulerConfig::default()
    };
    assert_eq!(config.max_new, 1);

    let sqlite = SqliteStore::open_in_memory()?;
    sqlite.import_index(&index)?;
    assert_cold_start(&IntroScheduler::new(sqlite, config.clone()))?;
    assert_cold_start(&IntroScheduler::new(MemoryStore::new(Arc::new(index)), config))
}

fn assert_idempotent_exposure<S: LearnerStore>(scheduler: &IntroScheduler<S>) -> Result<()> {
    let first = scheduler.record_exposure(USER, 1, 3)?;
    assert!(first.introduced);
    let second = scheduler.record_exposure(USER, 1, 3)?;
    assert!(!second.introduced);

    let counts = scheduler.state_counts(USER)?;
    assert_eq!(counts.intro, 1);
    assert_eq!(counts.new, 5);
    Ok(())
}

/// Integration test: recording the same target twice promotes it once
#[test]
fn test_record_exposure_is_idempotent() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_corpus(temp_dir.path());

    let memory = memory_scheduler(temp_dir.path());
    assert_idempotent_exposure(&memory)?;
    let state = memory.store().word_state(USER, 3)?.unwrap();
    assert_eq!((state.state, state.reps, state.lapses), (WordStateKind::Intro, 0, 0));
    assert_eq!(memory.store().history(USER)?.len(), 2);

    let sqlite = sqlite_scheduler(temp_dir.path());
    assert_idempotent_exposure(&sqlite)?;
    let state = sqlite.store().word_state(USER, 3)?.unwrap();
    assert_eq!((state.state, state.reps, state.lapses), (WordStateKind::Intro, 0, 0));
    assert!(state.last_result.is_none());
    assert_eq!(sqlite.store().history(USER)?.len(), 2);

    Ok(())
}

/// Repeatedly select and record until nothing is left; return the targets in order.
fn drain<S: LearnerStore>(scheduler: &IntroScheduler<S>) -> Vec<String> {
    let config = scheduler.config().clone();
    let mut targets = Vec::new();
    for _ in 0..=scheduler.store().word_count().unwrap() {
        match scheduler.get_next_phrase(USER).unwrap() {
            NextPhrase::Found(result) => {
                if result.mode == SelectionMode::Strict {
                    assert!(result.n_new <= config.max_new);
                    assert!(result.n_new + result.n_intro <= config.max_new_plus_intro);
                    assert!(result.n_learn <= config.max_learn);
                } else {
                    assert_eq!(result.n_new, 1);
                    assert!(result.length <= config.relaxed.max_length);
                }
                targets.push(result.target_word_text);
            }
            NextPhrase::NoCandidate => return targets,
        }
    }
    panic!("selection did not terminate: {:?}", targets);
}

/// Integration test: both backends walk the same sequence until exhausted
#[test]
fn test_backends_agree_until_exhaustion() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_corpus(temp_dir.path());

    let memory = memory_scheduler(temp_dir.path());
    let sqlite = sqlite_scheduler(temp_dir.path());
    let seed = lists(&["el"], &[], &[]);
    memory.seed_word_lists(USER, &seed)?;
    sqlite.seed_word_lists(USER, &seed)?;

    let memory_targets = drain(&memory);
    let sqlite_targets = drain(&sqlite);
    assert_eq!(memory_targets, sqlite_targets);
    assert_eq!(memory_targets, vec!["perro", "bebe", "agua", "gato", "come"]);

    // Every target is introduced exactly once
    let unique: HashSet<&String> = memory_targets.iter().collect();
    assert_eq!(unique.len(), memory_targets.len());
    assert_eq!(
        memory.state_counts(USER)?.intro,
        memory_targets.len(),
        "each selection introduces one word"
    );
    assert_eq!(memory.store().history(USER)?.len(), memory_targets.len());

    Ok(())
}

/// Integration test: an empty unknown pool ends selection
#[test]
fn test_fully_known_vocabulary_is_exhausted() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_corpus(temp_dir.path());
    let all = ["el", "gato", "come", "perro", "bebe", "agua"];

    let memory = memory_scheduler(temp_dir.path());
    memory.seed_word_lists(USER, &lists(&all, &[], &[]))?;
    assert_eq!(memory.get_next_phrase(USER)?, NextPhrase::NoCandidate);
    assert!(memory.store().history(USER)?.is_empty());

    let sqlite = sqlite_scheduler(temp_dir.path());
    sqlite.seed_word_lists(USER, &lists(&all, &[], &[]))?;
    assert_eq!(sqlite.get_next_phrase(USER)?, NextPhrase::NoCandidate);
    assert_eq!(sqlite.state_counts(USER)?.known, 6);

    Ok(())
}

/// Integration test: relaxed pass re-offers a shown phrase when strict has nothing
#[test]
fn test_relaxed_fallback_reuses_shown_phrase() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_corpus(temp_dir.path());
    let sqlite = sqlite_scheduler(temp_dir.path());

    // Only gato is unknown; both phrases with gato were already shown
    sqlite.seed_word_lists(USER, &lists(&["el", "come", "perro", "bebe", "agua"], &[], &[]))?;
    sqlite.record_exposure(USER, 0, 0)?;
    sqlite.record_exposure(USER, 2, 0)?;

    let next = sqlite.get_next_phrase(USER)?;
    let result = next.found().expect("relaxed pass should find a phrase");
    assert_eq!(result.mode, SelectionMode::Relaxed);
    assert_eq!(result.target_word_text, "gato");
    // el gato come is cheaper than the four word phrase
    assert_eq!(result.phrase_id, 0);
    assert_eq!(sqlite.store().word_state(USER, 1)?.unwrap().state, WordStateKind::Intro);

    Ok(())
}

/// Integration test: preview mode leaves no trace
#[test]
fn test_preview_does_not_write() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_corpus(temp_dir.path());
    let sqlite = sqlite_scheduler(temp_dir.path());
    sqlite.seed_word_lists(USER, &lists(&["el"], &[], &[]))?;

    let preview = sqlite.preview_next_phrase(USER)?;
    assert!(preview.is_found());
    assert!(sqlite.store().history(USER)?.is_empty());

    let committed = sqlite.get_next_phrase(USER)?;
    assert_eq!(preview, committed);
    assert_eq!(sqlite.store().history(USER)?.len(), 1);

    Ok(())
}

/// Integration test: learner state survives reopening the database
#[test]
fn test_sqlite_state_persists() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_corpus(temp_dir.path());

    let first = {
        let scheduler = sqlite_scheduler(temp_dir.path());
        scheduler.seed_word_lists(USER, &lists(&["el"], &[], &[]))?;
        scheduler.get_next_phrase(USER)?
    };
    let first = first.found().cloned().expect("first selection");

    let store = SqliteStore::open(&temp_dir.path().join("srs.db"), 5000)?;
    store.ensure_corpus()?;
    let reopened = IntroScheduler::new(store, SchedulerConfig::default());
    let state = reopened.store().word_state(USER, first.target_word_id)?.unwrap();
    assert_eq!(state.state, WordStateKind::Intro);

    let second = reopened.get_next_phrase(USER)?;
    if let NextPhrase::Found(second) = second {
        assert_ne!(second.target_word_id, first.target_word_id);
    }

    Ok(())
}

/// Integration test: users do not see each other's state
#[test]
fn test_users_are_independent() -> Result<()> {
    let temp_dir = TempDir::new()?;
    write_corpus(temp_dir.path());
    let sqlite = sqlite_scheduler(temp_dir.path());

    sqlite.seed_word_lists(1, &lists(&["el", "gato"], &[], &[]))?;
    assert_eq!(sqlite.state_counts(2)?.new, 6);
    assert_eq!(sqlite.state_counts(1)?.known, 2);

    Ok(())
}

fn assert_serialized(results: Vec<NextPhrase>) {
    let found: Vec<_> = results.iter().filter_map(NextPhrase::found).collect();
    let targets: HashSet<u32> = found.iter().map(|r| r.target_word_id).collect();
    assert_eq!(targets.len(), found.len(), "two requests promoted the same target");
}

/// Integration test: concurrent requests for one user never share a target (memory)
#[test]
fn test_concurrent_same_user_memory() {
    let temp_dir = TempDir::new().unwrap();
    write_corpus(temp_dir.path());
    let scheduler = memory_scheduler(temp_dir.path());
    scheduler.seed_word_lists(USER, &lists(&["el"], &[], &[])).unwrap();

    let results: Vec<NextPhrase> = thread::scope(|s| {
        let handles: Vec<_> = (0..2).map(|_| s.spawn(|| scheduler.get_next_phrase(USER).unwrap())).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_serialized(results);
}

/// Integration test: separate connections to one database serialize per user (sqlite)
#[test]
fn test_concurrent_same_user_sqlite() {
    let temp_dir = TempDir::new().unwrap();
    write_corpus(temp_dir.path());
    let seeded = sqlite_scheduler(temp_dir.path());
    seeded.seed_word_lists(USER, &lists(&["el"], &[], &[])).unwrap();
    drop(seeded);

    let db_path = temp_dir.path().join("srs.db");
    let results: Vec<NextPhrase> = thread::scope(|s| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let db_path = db_path.clone();
                s.spawn(move || {
                    let store = SqliteStore::open(&db_path, 5000).unwrap();
                    let scheduler = IntroScheduler::new(store, SchedulerConfig::default());
                    scheduler.get_next_phrase(USER).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let found = results.iter().filter(|r| r.is_found()).count();
    let store = SqliteStore::open(&db_path, 5000).unwrap();
    assert_eq!(store.history(USER).unwrap().len(), found);
    assert_serialized(results);
}
