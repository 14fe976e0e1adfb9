//! Logging initialization and configuration.
//!
//! The child process shares our terminal, so logs are written to files in a
//! `logs/` directory instead of stdout/stderr. Each run gets its own file.
//!
//! # Configuration
//!
//! The log level can be controlled via the `RUST_LOG` environment variable:
//! - `RUST_LOG=debug` - Show debug and higher level logs
//! - `RUST_LOG=info` - Show info and higher level logs (default)
//! - `RUST_LOG=trace` - Also log every key press seen while a child runs

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the logging system.
///
/// Logs go to `log_dir` if given, otherwise to `logs/` in the executable's
/// directory. Each run creates a new log file with a timestamp, e.g.:
/// `logs/exercise-runner.2024-12-06-14-30-25.log`
///
/// Writes are synchronous: the process usually ends through
/// `std::process::exit`, which would drop anything still buffered.
pub fn init_logging(log_dir: Option<&Path>) {
    let log_dir = log_dir.map(Path::to_path_buf).unwrap_or_else(default_log_dir);

    // Ensure the logs directory exists
    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create logs directory: {}", e);
        return;
    }

    let timestamp = Local::now().format("%Y-%m-%d-%H-%M-%S");
    let log_filename = format!("exercise-runner.{}.log", timestamp);
    let appender = tracing_appender::rolling::never(&log_dir, &log_filename);

    let file_layer = fmt::layer()
        .with_writer(appender)
        .with_ansi(false)  // No ANSI colors in log files
        .with_target(true)  // Include module path
        .with_line_number(true);

    // Default to "info" level if RUST_LOG is not set
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
    {
        eprintln!("Warning: Failed to initialize logging: {}", e);
        return;
    }

    tracing::info!("Logging initialized - writing to {}", log_dir.join(&log_filename).display());
}

fn default_log_dir() -> PathBuf {
    match std::env::current_exe() {
        Ok(exe_path) => exe_path
            .parent()
            .map(|p| p.join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs")),
        Err(_) => PathBuf::from("logs"),
    }
}
