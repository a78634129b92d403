//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - next: select (and by default record) the next phrase
//! - record: record an exposure explicitly
//! - answer: forward a review answer
//! - stats: word counts per state
//! - seed: set word states from word lists
//! - import: load the TSV corpus into SQLite

use clap::{Args, Parser, Subcommand, ValueEnum};
use phrase_scheduler::scheduler::{RelaxedPolicy, SchedulerConfig};
use std::path::PathBuf;

use crate::config::Backend;

/// Phrase scheduler - introduces new vocabulary one phrase at a time
#[derive(Parser, Debug)]
#[command(name = "phrase-scheduler")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Storage backend (overrides config)
    #[arg(short, long, global = true, value_enum)]
    pub backend: Option<Backend>,

    /// SQLite database path (overrides config)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Corpus index directory (overrides config)
    #[arg(long, global = true)]
    pub index_dir: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Select the next phrase to introduce
    Next {
        /// Learner id
        #[arg(short, long, default_value_t = 1)]
        user: i64,

        /// Preview only; do not record the exposure
        #[arg(long)]
        no_history: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        tunables: TunableArgs,

        #[command(flatten)]
        seed: SeedArgs,
    },

    /// Record an exposure of a phrase with a target word
    Record {
        #[arg(short, long, default_value_t = 1)]
        user: i64,

        phrase_id: u32,

        word_id: u32,
    },

    /// Forward a review answer (again, hard, good, easy)
    Answer {
        #[arg(short, long, default_value_t = 1)]
        user: i64,

        phrase_id: u32,

        result: String,
    },

    /// Show word counts per state
    Stats {
        #[arg(short, long, default_value_t = 1)]
        user: i64,

        /// Print the counts as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        seed: SeedArgs,
    },

    /// Set word states from word lists
    Seed {
        #[arg(short, long, default_value_t = 1)]
        user: i64,

        #[command(flatten)]
        seed: SeedArgs,
    },

    /// Import the TSV corpus into the SQLite database
    Import {
        /// Directory holding the corpus tables (defaults to the index dir)
        dir: Option<PathBuf>,
    },
}

/// Per-call overrides of the scheduler tunables.
#[derive(Args, Debug, Default, Clone)]
pub struct TunableArgs {
    /// Maximum NEW words per phrase in strict mode
    #[arg(long)]
    pub max_new: Option<usize>,

    /// Maximum NEW plus INTRO words per phrase in strict mode
    #[arg(long)]
    pub max_new_plus_intro: Option<usize>,

    /// Maximum LEARN words per phrase in strict mode
    #[arg(long)]
    pub max_learn: Option<usize>,

    /// Number of unknown words searched
    #[arg(long)]
    pub top_unknown: Option<usize>,

    /// Fallback admission rule
    #[arg(long, value_enum)]
    pub relaxed_policy: Option<RelaxedArg>,

    /// Maximum phrase length in relaxed mode
    #[arg(long)]
    pub relaxed_max_length: Option<u32>,
}

impl TunableArgs {
    pub fn is_empty(&self) -> bool {
        self.max_new.is_none()
            && self.max_new_plus_intro.is_none()
            && self.max_learn.is_none()
            && self.top_unknown.is_none()
            && self.relaxed_policy.is_none()
            && self.relaxed_max_length.is_none()
    }

    /// Overlay the given flags on a copy of `base`.
    pub fn apply(&self, base: &SchedulerConfig) -> SchedulerConfig {
        let mut config = base.clone();
        if let Some(n) = self.max_new {
            config.max_new = n;
        }
        if let Some(n) = self.max_new_plus_intro {
            config.max_new_plus_intro = n;
        }
        if let Some(n) = self.max_learn {
            config.max_learn = n;
        }
        if let Some(n) = self.top_unknown {
            config.top_unknown_candidates = n;
        }
        if let Some(policy) = self.relaxed_policy {
            config.relaxed.policy = policy.into();
        }
        if let Some(n) = self.relaxed_max_length {
            config.relaxed.max_length = n;
        }
        config
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelaxedArg {
    /// Exactly one NEW word
    OneNew,
    /// Any number of NEW words
    AnyNew,
}

impl From<RelaxedArg> for RelaxedPolicy {
    fn from(arg: RelaxedArg) -> Self {
        match arg {
            RelaxedArg::OneNew => RelaxedPolicy::OneNew,
            RelaxedArg::AnyNew => RelaxedPolicy::AnyNew,
        }
    }
}

/// Word list files, one word per line.
#[derive(Args, Debug, Default, Clone)]
pub struct SeedArgs {
    /// Words the learner already knows
    #[arg(long)]
    pub known: Option<PathBuf>,

    /// Words already introduced
    #[arg(long)]
    pub intro: Option<PathBuf>,

    /// Words being learned
    #[arg(long)]
    pub learn: Option<PathBuf>,
}

impl SeedArgs {
    pub fn is_empty(&self) -> bool {
        self.known.is_none() && self.intro.is_none() && self.learn.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_requires_command() {
        assert!(Cli::try_parse_from(["phrase-scheduler"]).is_err());
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::try_parse_from(["phrase-scheduler", "-v", "stats"]).unwrap();
        assert!(cli.is_verbose());
    }

    #[test]
    fn test_cli_config_option() {
        let cli = Cli::try_parse_from(["phrase-scheduler", "-c", "/path/to/config.yml", "stats"]).unwrap();
        assert_eq!(cli.config.as_ref(), Some(&PathBuf::from("/path/to/config.yml")));
    }

    #[test]
    fn test_global_backend_after_subcommand() {
        let cli = Cli::try_parse_from(["phrase-scheduler", "next", "--backend", "memory", "--index-dir", "idx"]).unwrap();
        assert_eq!(cli.backend, Some(Backend::Memory));
        assert_eq!(cli.index_dir, Some(PathBuf::from("idx")));
    }

    #[test]
    fn test_next_defaults() {
        let cli = Cli::try_parse_from(["phrase-scheduler", "next"]).unwrap();
        match cli.command {
            Commands::Next {
                user,
                no_history,
                json,
                tunables,
                seed,
            } => {
                assert_eq!(user, 1);
                assert!(!no_history);
                assert!(!json);
                assert!(tunables.is_empty());
                assert!(seed.is_empty());
            }
            _ => panic!("Expected next command"),
        }
    }

    #[test]
    fn test_next_with_tunables() {
        let cli = Cli::try_parse_from([
            "phrase-scheduler",
            "next",
            "-u",
            "42",
            "--no-history",
            "--json",
            "--max-new",
            "2",
            "--relaxed-policy",
            "any-new",
            "--known",
            "known.txt",
        ])
        .unwrap();
        match cli.command {
            Commands::Next {
                user,
                no_history,
                json,
                tunables,
                seed,
            } => {
                assert_eq!(user, 42);
                assert!(no_history);
                assert!(json);
                let config = tunables.apply(&SchedulerConfig::default());
                assert_eq!(config.max_new, 2);
                assert_eq!(config.max_learn, 2);
                assert_eq!(config.relaxed.policy, RelaxedPolicy::AnyNew);
                assert_eq!(seed.known, Some(PathBuf::from("known.txt")));
            }
            _ => panic!("Expected next command"),
        }
    }

    #[test]
    fn test_record_command() {
        let cli = Cli::try_parse_from(["phrase-scheduler", "record", "-u", "3", "10", "7"]).unwrap();
        match cli.command {
            Commands::Record {
                user,
                phrase_id,
                word_id,
            } => {
                assert_eq!((user, phrase_id, word_id), (3, 10, 7));
            }
            _ => panic!("Expected record command"),
        }
    }

    #[test]
    fn test_answer_command() {
        let cli = Cli::try_parse_from(["phrase-scheduler", "answer", "10", "good"]).unwrap();
        match cli.command {
            Commands::Answer { user, phrase_id, result } => {
                assert_eq!(user, 1);
                assert_eq!(phrase_id, 10);
                assert_eq!(result, "good");
            }
            _ => panic!("Expected answer command"),
        }
    }

    #[test]
    fn test_import_command() {
        let cli = Cli::try_parse_from(["phrase-scheduler", "import"]).unwrap();
        assert!(matches!(cli.command, Commands::Import { dir: None }));

        let cli = Cli::try_parse_from(["phrase-scheduler", "import", "corpus"]).unwrap();
        match cli.command {
            Commands::Import { dir } => assert_eq!(dir, Some(PathBuf::from("corpus"))),
            _ => panic!("Expected import command"),
        }
    }

    #[test]
    fn test_unknown_backend_rejected() {
        assert!(Cli::try_parse_from(["phrase-scheduler", "-b", "redis", "stats"]).is_err());
    }

    #[test]
    fn test_help_works() {
        // Verify help doesn't panic
        Cli::command().debug_assert();
    }

    #[test]
    fn test_version_flag() {
        let result = Cli::try_parse_from(["phrase-scheduler", "--version"]);
        // Version flag causes early exit with error (expected)
        assert!(result.is_err());
    }
}
