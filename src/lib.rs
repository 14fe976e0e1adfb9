//! exercise-runner - run course exercises by number
//!
//! This library provides the pieces behind the `exercise-runner` binary:
//! - Exercise selection: locating an exercise on disk and choosing one of its
//!   implementations
//! - Process supervision: running the chosen implementation as a child process
//!   with raw keyboard input relayed to it, and restoring the terminal on every
//!   exit path
//! - Key decoding and kill-gesture detection for raw terminal input
//!
//! # Example
//!
//! ```no_run
//! use exercise_runner::{App, Config};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let config = Config::for_root(std::path::Path::new("."));
//!     let mut app = App::new(&config);
//!
//!     // Resolves exercise "05", runs it, and returns the exit code to use
//!     let code = app.run("05").await;
//!     std::process::exit(code);
//! }
//! ```

pub mod app;
pub mod config;
pub mod event;
pub mod selector;
pub mod supervisor;
pub mod terminal;
pub mod utils;

// Re-export commonly used types
pub use app::App;
pub use config::{Cli, Config};
pub use selector::{EntryPoint, Resolution, ResolutionError, Selector};
pub use supervisor::{DisposeHandle, Supervisor, TerminationReason};
