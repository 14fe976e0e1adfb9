//! Application flow.
//!
//! Resolves the requested exercise, runs it under the supervisor and turns
//! the outcome into the process exit code:
//! - 0: the child succeeded, the run was stopped by the user or a signal,
//!   or no implementation was chosen
//! - 1: the exercise could not be resolved, or the child could not be run
//! - the child's own non-zero exit code otherwise

use tracing::{error, info, warn};

use crate::config::Config;
use crate::selector::{FuzzyPicker, Resolution, Selector};
use crate::supervisor::Supervisor;

pub struct App {
    selector: Selector,
    supervisor: Supervisor,
}

impl App {
    /// The interactive application: terminal picker, supervisor on stdin.
    pub fn new(config: &Config) -> Self {
        Self::with_parts(
            Selector::new(config, Box::new(FuzzyPicker)),
            Supervisor::new(),
        )
    }

    pub fn with_parts(selector: Selector, supervisor: Supervisor) -> Self {
        Self {
            selector,
            supervisor,
        }
    }

    /// Runs one exercise and returns the exit code for the process.
    pub async fn run(&mut self, identifier: &str) -> i32 {
        let entry = match self.selector.resolve(identifier) {
            Ok(Resolution::Selected(entry)) => entry,
            Ok(Resolution::NoSelection) => {
                info!(identifier, "no directory selected");
                println!("No directory selected. Exiting.");
                return 0;
            }
            Err(e) => {
                error!(identifier, "{}", e);
                eprintln!("{}", e);
                return 1;
            }
        };

        info!(identifier, entry = %entry.entry_file.display(), "running exercise");
        println!(
            "Running exercise {} from {}",
            identifier,
            entry.entry_file.display()
        );

        let reason = self.supervisor.run(&entry).await;
        let code = reason.exit_code();
        match reason.into_result() {
            Ok(()) => info!(code, "run finished"),
            Err(e) => warn!(code, "run finished: {}", e),
        }
        code
    }
}
