//! CLI module for phrase-scheduler - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for phrase selection,
//! exposure recording, learner statistics and corpus import.

pub mod commands;

pub use commands::Cli;
