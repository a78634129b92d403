use clap::Parser;
use colored::*;
use eyre::{Context, Result, bail};
use log::info;
use phrase_scheduler::corpus::{load_index_dir, read_word_list};
use phrase_scheduler::learner::{AnswerResult, StateCounts, UserId, WordStateKind};
use phrase_scheduler::scheduler::{IntroScheduler, NextPhrase, PhraseResult, WordLists};
use phrase_scheduler::store::{LearnerStore, MemoryStore, SqliteStore};
use phrase_scheduler::SchedulerError;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod cli;
mod config;

use cli::Cli;
use cli::commands::{Commands, SeedArgs, TunableArgs};
use config::{Backend, Config};

fn setup_logging(level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(env!("CARGO_PKG_NAME"))
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join(format!("{}.log", env!("CARGO_PKG_NAME")));

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.unwrap_or("info")))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Apply CLI overrides on top of the loaded config.
fn resolve_config(cli: &Cli, mut config: Config) -> Config {
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(db) = &cli.db {
        config.database.path = db.clone();
    }
    if let Some(dir) = &cli.index_dir {
        config.corpus.index_dir = dir.clone();
    }
    config
}

fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application with {:?} backend", config.backend);

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    if let Commands::Import { dir } = &cli.command {
        return handle_import_command(dir.as_deref(), config);
    }

    match config.backend {
        Backend::Sqlite => {
            let store = SqliteStore::open(&config.database.path, config.database.busy_timeout_ms)
                .context(format!("Failed to open database {}", config.database.path.display()))?;
            store
                .ensure_corpus()
                .context("Database has no corpus; run `phrase-scheduler import` first")?;
            run_command(cli, &IntroScheduler::new(store, config.scheduler.clone()))
        }
        Backend::Memory => {
            let dir = &config.corpus.index_dir;
            if !dir.is_dir() {
                bail!(SchedulerError::Config(format!("index dir {} does not exist", dir.display())));
            }
            let (index, report) = load_index_dir(dir, &config.corpus.files)
                .context(format!("Failed to load corpus from {}", dir.display()))?;
            if index.is_empty() {
                bail!(SchedulerError::EmptyCorpus(format!("no words in {}", dir.display())));
            }
            if cli.is_verbose() {
                println!(
                    "{} {} words, {} phrases ({} rows skipped)",
                    "Loaded:".green(),
                    report.words,
                    report.phrases,
                    report.skipped()
                );
            }
            let store = MemoryStore::new(Arc::new(index));
            run_command(cli, &IntroScheduler::new(store, config.scheduler.clone()))
        }
    }
}

fn run_command<S: LearnerStore>(cli: &Cli, scheduler: &IntroScheduler<S>) -> Result<()> {
    match &cli.command {
        Commands::Next {
            user,
            no_history,
            json,
            tunables,
            seed,
        } => {
            apply_seed(scheduler, *user, seed)?;
            handle_next_command(scheduler, *user, !*no_history, *json, tunables)
        }
        Commands::Record {
            user,
            phrase_id,
            word_id,
        } => handle_record_command(scheduler, *user, *phrase_id, *word_id),
        Commands::Answer {
            user,
            phrase_id,
            result,
        } => handle_answer_command(scheduler, *user, *phrase_id, result),
        Commands::Stats { user, json, seed } => {
            apply_seed(scheduler, *user, seed)?;
            handle_stats_command(scheduler, *user, *json)
        }
        Commands::Seed { user, seed } => {
            if seed.is_empty() {
                bail!("Nothing to seed: pass --known, --intro or --learn");
            }
            apply_seed(scheduler, *user, seed)?;
            handle_stats_command(scheduler, *user, false)
        }
        // Runs before any store is opened
        Commands::Import { .. } => Ok(()),
    }
}

fn apply_seed<S: LearnerStore>(scheduler: &IntroScheduler<S>, user: UserId, seed: &SeedArgs) -> Result<()> {
    if seed.is_empty() {
        return Ok(());
    }
    let read = |path: &Option<PathBuf>| -> Result<Vec<String>> {
        match path {
            Some(p) => read_word_list(p).context(format!("Failed to read word list {}", p.display())),
            None => Ok(Vec::new()),
        }
    };
    let lists = WordLists {
        known: read(&seed.known)?,
        intro: read(&seed.intro)?,
        learn: read(&seed.learn)?,
    };
    let report = scheduler
        .seed_word_lists(user, &lists)
        .context("Failed to seed word states")?;
    info!(
        "Seeded {} words for user {} ({} not in corpus)",
        report.seeded, user, report.ignored
    );
    Ok(())
}

#[derive(Serialize)]
struct PhraseResponse<'a> {
    status: &'static str,
    #[serde(flatten)]
    phrase: &'a PhraseResult,
    state_counts: StateCounts,
}

fn handle_next_command<S: LearnerStore>(
    scheduler: &IntroScheduler<S>,
    user: UserId,
    record: bool,
    json: bool,
    tunables: &TunableArgs,
) -> Result<()> {
    info!("Selecting next phrase for user {} (record: {})", user, record);
    let counts = scheduler.state_counts(user).context("Failed to read word states")?;
    if !json {
        print_counts(user, &counts);
    }

    let next = match (tunables.is_empty(), record) {
        (true, true) => scheduler.get_next_phrase(user),
        (true, false) => scheduler.preview_next_phrase(user),
        _ => scheduler.next_phrase_with(user, &tunables.apply(scheduler.config()), record),
    };
    let next = next.context("Failed to select next phrase")?;

    let result = match next {
        NextPhrase::Found(result) => result,
        NextPhrase::NoCandidate => {
            if json {
                println!("{}", serde_json::json!({ "status": "NO_PHRASE" }));
            } else {
                println!("{}", "NO_PHRASE_FOUND".red());
            }
            return Ok(());
        }
    };

    if json {
        let response = PhraseResponse {
            status: "OK",
            phrase: &result,
            state_counts: counts,
        };
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    println!("{}", "=== NEXT PHRASE ===".bold());
    println!("phrase_id : {}", result.phrase_id);
    println!("phrase    : {}", result.phrase_text.cyan());
    println!("target    : {}", result.target_word_text.green());
    println!("score     : {:.3}", result.cost);
    println!("freq      : {}", result.freq);
    println!("length    : {}", result.length);
    println!(
        "n_new / n_intro / n_learn : {} / {} / {}",
        result.n_new, result.n_intro, result.n_learn
    );
    println!("mode      : {}", result.mode.to_string().yellow());
    if record {
        println!(
            "\n{} History updated, target word marked as INTRO (if it was NEW).",
            "Recorded:".green()
        );
    }
    Ok(())
}

fn handle_record_command<S: LearnerStore>(
    scheduler: &IntroScheduler<S>,
    user: UserId,
    phrase_id: u32,
    word_id: u32,
) -> Result<()> {
    info!("Recording exposure: user={} phrase={} word={}", user, phrase_id, word_id);
    let outcome = scheduler
        .record_exposure(user, phrase_id, word_id)
        .context("Failed to record exposure")?;
    if outcome.introduced {
        println!("{} word {} is now INTRO", "Recorded:".green(), word_id);
    } else {
        println!("{} word {} already had a state", "Recorded:".green(), word_id);
    }
    Ok(())
}

fn handle_answer_command<S: LearnerStore>(
    scheduler: &IntroScheduler<S>,
    user: UserId,
    phrase_id: u32,
    result: &str,
) -> Result<()> {
    let answer: AnswerResult = result.parse().context("Invalid answer")?;
    scheduler
        .process_answer(user, phrase_id, answer)
        .context("Failed to process answer")?;
    println!("{} {} for phrase {}", "Answer:".green(), answer, phrase_id);
    Ok(())
}

fn handle_stats_command<S: LearnerStore>(scheduler: &IntroScheduler<S>, user: UserId, json: bool) -> Result<()> {
    let counts = scheduler.state_counts(user).context("Failed to read word states")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&counts)?);
    } else {
        print_counts(user, &counts);
    }
    Ok(())
}

fn handle_import_command(dir: Option<&Path>, config: &Config) -> Result<()> {
    let dir = dir.unwrap_or(&config.corpus.index_dir);
    info!("Importing corpus from {}", dir.display());
    let store = SqliteStore::open(&config.database.path, config.database.busy_timeout_ms)
        .context(format!("Failed to open database {}", config.database.path.display()))?;
    let report = store
        .import_dir(dir, &config.corpus.files)
        .context(format!("Failed to import corpus from {}", dir.display()))?;
    println!(
        "{} {} words, {} phrases, {} links into {} ({} rows skipped)",
        "Imported:".green(),
        report.words,
        report.phrases,
        report.links,
        config.database.path.display(),
        report.skipped()
    );
    Ok(())
}

fn print_counts(user: UserId, counts: &StateCounts) {
    println!("{} user {}:", "Word states for".cyan(), user);
    for kind in WordStateKind::ALL {
        println!("  {:6}: {}", kind.as_str(), counts.get(kind));
    }
    println!();
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    let config = resolve_config(&cli, config);

    // Setup logging with the configured default level
    setup_logging(config.log_level.as_deref()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).context("Application failed")?;

    Ok(())
}
