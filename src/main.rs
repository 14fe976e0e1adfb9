//! Main entry point for exercise-runner.
//!
//! Parses the command line, initializes logging, runs the requested exercise
//! and exits with the code the run produced.

use clap::Parser;
use exercise_runner::utils;
use exercise_runner::{App, Cli};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let (exercise, config) = Cli::parse().into_parts();

    // Initialize logging before anything else
    utils::logger::init_logging(config.log_dir.as_deref());

    let mut app = App::new(&config);
    let code = app.run(&exercise).await;

    // The terminal has been restored by now; the child may still be running
    // after a kill gesture, and is deliberately not waited for.
    std::process::exit(code);
}
