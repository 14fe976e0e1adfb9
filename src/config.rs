//! Command-line interface and resolved configuration.
//!
//! Every path option can also be given through an environment variable, so a
//! course repository can pin its layout once (e.g. in a package script) and
//! learners only ever type the exercise number.

use std::path::{Path, PathBuf};

use clap::Parser;

pub const DEFAULT_ENTRY_FILE: &str = "main.ts";

/// Run an exercise by number.
#[derive(Debug, Parser)]
#[command(name = "exercise-runner", version, about)]
pub struct Cli {
    /// Exercise identifier, matched against exercise directory names (e.g. `05`)
    pub exercise: String,

    /// Course root that holds `exercises/`, `node_modules/` and `.env`
    #[arg(long, env = "EXERCISE_RUNNER_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Exercises directory [default: <root>/exercises]
    #[arg(long, env = "EXERCISE_RUNNER_EXERCISES_DIR")]
    pub exercises_dir: Option<PathBuf>,

    /// Name of the entry file inside each implementation directory
    #[arg(long, env = "EXERCISE_RUNNER_ENTRY_FILE", default_value = DEFAULT_ENTRY_FILE)]
    pub entry_file: String,

    /// Executable that runs the entry file [default: <root>/node_modules/.bin/tsx]
    #[arg(long, env = "EXERCISE_RUNNER_RUNNER")]
    pub runner: Option<PathBuf>,

    /// Environment file passed to the runner [default: <root>/.env]
    #[arg(long, env = "EXERCISE_RUNNER_ENV_FILE")]
    pub env_file: Option<PathBuf>,

    /// Directory for log files [default: logs/ next to the executable]
    #[arg(long, env = "EXERCISE_RUNNER_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

/// Paths the selector and supervisor work with, defaults filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub exercises_dir: PathBuf,
    pub entry_file: String,
    pub runner: PathBuf,
    pub env_file: PathBuf,
    pub log_dir: Option<PathBuf>,
}

impl Config {
    /// Default layout under a course root.
    pub fn for_root(root: &Path) -> Self {
        Self {
            exercises_dir: root.join("exercises"),
            entry_file: DEFAULT_ENTRY_FILE.to_string(),
            runner: root.join("node_modules").join(".bin").join("tsx"),
            env_file: root.join(".env"),
            log_dir: None,
        }
    }
}

impl Cli {
    /// Splits the CLI into the exercise identifier and the resolved config.
    pub fn into_parts(self) -> (String, Config) {
        let defaults = Config::for_root(&self.root);
        let config = Config {
            exercises_dir: self.exercises_dir.unwrap_or(defaults.exercises_dir),
            entry_file: self.entry_file,
            runner: self.runner.unwrap_or(defaults.runner),
            env_file: self.env_file.unwrap_or(defaults.env_file),
            log_dir: self.log_dir,
        };
        (self.exercise, config)
    }
}
