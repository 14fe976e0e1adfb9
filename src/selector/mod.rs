//! Exercise selection.
//!
//! Resolves an exercise identifier to the [`EntryPoint`] the supervisor runs:
//! the exercise is looked up on disk, one of its candidate implementations is
//! chosen (automatically when there is only one), and the entry file is
//! checked to exist before anything is spawned.

mod discovery;
mod picker;

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;

use tracing::info;

use crate::config::Config;

pub use discovery::{find_exercise, list_candidates};
pub use picker::{FuzzyPicker, Picker};

/// A validated, runnable exercise implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    /// Directory the child runs in: the chosen candidate.
    pub working_dir: PathBuf,
    /// The exercise's entry file, passed to the runner.
    pub entry_file: PathBuf,
    /// Executable that runs the entry file.
    pub runner: PathBuf,
    /// Environment file handed to the runner, if one exists.
    pub env_file: Option<PathBuf>,
}

impl EntryPoint {
    /// The `--env-file=<path>` argument, if there is an environment file.
    pub fn env_file_arg(&self) -> Option<OsString> {
        self.env_file.as_ref().map(|path| {
            let mut arg = OsString::from("--env-file=");
            arg.push(path);
            arg
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Resolution {
    Selected(EntryPoint),
    /// The user dismissed the interactive choice.
    NoSelection,
}

#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("Exercises directory not found at {}", .0.display())]
    ExercisesDirMissing(PathBuf),
    #[error("Could not find exercise {0} in any section.")]
    ExerciseNotFound(String),
    #[error("No directories found in exercise {0}.")]
    NoCandidates(String),
    #[error("Could not find {entry_file} file in {candidate} for exercise {identifier}.")]
    MissingEntryFile {
        entry_file: String,
        candidate: String,
        identifier: String,
    },
    #[error("Failed to read exercises: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to choose a directory: {0}")]
    Prompt(#[source] io::Error),
}

/// Resolves identifiers against one exercises tree.
pub struct Selector {
    exercises_dir: PathBuf,
    entry_file: String,
    runner: PathBuf,
    env_file: PathBuf,
    picker: Box<dyn Picker>,
}

impl Selector {
    pub fn new(config: &Config, picker: Box<dyn Picker>) -> Self {
        Self {
            exercises_dir: config.exercises_dir.clone(),
            entry_file: config.entry_file.clone(),
            runner: config.runner.clone(),
            env_file: config.env_file.clone(),
            picker,
        }
    }

    pub fn resolve(&mut self, identifier: &str) -> Result<Resolution, ResolutionError> {
        if !self.exercises_dir.is_dir() {
            return Err(ResolutionError::ExercisesDirMissing(self.exercises_dir.clone()));
        }

        let exercise_dir = find_exercise(&self.exercises_dir, identifier)?
            .ok_or_else(|| ResolutionError::ExerciseNotFound(identifier.to_string()))?;

        let candidates = list_candidates(&exercise_dir)?;
        let candidate = match candidates.as_slice() {
            [] => return Err(ResolutionError::NoCandidates(identifier.to_string())),
            [only] => {
                println!("Auto-selecting directory: {}", only);
                info!(candidate = %only, "auto-selected the only candidate");
                only.clone()
            }
            _ => {
                let prompt = format!("Choose which directory to run for exercise {}:", identifier);
                match self
                    .picker
                    .pick(&prompt, &candidates)
                    .map_err(ResolutionError::Prompt)?
                {
                    Some(index) if index < candidates.len() => candidates[index].clone(),
                    _ => return Ok(Resolution::NoSelection),
                }
            }
        };

        let working_dir = exercise_dir.join(&candidate);
        let entry_file = working_dir.join(&self.entry_file);
        if !entry_file.is_file() {
            return Err(ResolutionError::MissingEntryFile {
                entry_file: self.entry_file.clone(),
                candidate,
                identifier: identifier.to_string(),
            });
        }

        let env_file = self.env_file.is_file().then(|| self.env_file.clone());
        if env_file.is_none() {
            tracing::debug!(path = %self.env_file.display(), "no environment file; runner gets none");
        }

        Ok(Resolution::Selected(EntryPoint {
            working_dir,
            entry_file,
            runner: self.runner.clone(),
            env_file,
        }))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedPicker;
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn tree(dirs: &[&str], files: &[&str]) -> anyhow::Result<TempDir> {
        let root = tempfile::tempdir()?;
        for d in dirs {
            fs::create_dir_all(root.path().join("exercises").join(d))?;
        }
        for f in files {
            fs::write(root.path().join("exercises").join(f), "")?;
        }
        Ok(root)
    }

    fn selector(root: &Path, picker: ScriptedPicker) -> Selector {
        Selector::new(&Config::for_root(root), Box::new(picker))
    }

    #[test]
    fn test_single_candidate_auto_selected() -> anyhow::Result<()> {
        let root = tree(&["01-intro/05-tools/problem"], &["01-intro/05-tools/problem/main.ts"])?;
        let picker = ScriptedPicker::default();
        let shown = picker.shown.clone();

        let resolution = selector(root.path(), picker).resolve("05")?;

        let dir = root.path().join("exercises/01-intro/05-tools/problem");
        assert_eq!(
            resolution,
            Resolution::Selected(EntryPoint {
                working_dir: dir.clone(),
                entry_file: dir.join("main.ts"),
                runner: root.path().join("node_modules/.bin/tsx"),
                env_file: None,
            })
        );
        assert!(shown.borrow().is_empty());
        Ok(())
    }

    #[test]
    fn test_multiple_candidates_prompt() -> anyhow::Result<()> {
        let root = tree(
            &["01-intro/05-tools/problem", "01-intro/05-tools/solution"],
            &["01-intro/05-tools/solution/main.ts"],
        )?;
        fs::write(root.path().join(".env"), "KEY=value\n")?;
        let picker = ScriptedPicker::answering(Some(1));
        let shown = picker.shown.clone();

        let resolution = selector(root.path(), picker).resolve("05")?;

        assert_eq!(shown.borrow().as_slice(), &[vec!["problem".to_string(), "solution".to_string()]]);
        let Resolution::Selected(entry) = resolution else {
            panic!("expected a selection");
        };
        assert!(entry.working_dir.ends_with("05-tools/solution"));
        assert_eq!(entry.env_file, Some(root.path().join(".env")));
        Ok(())
    }

    #[test]
    fn test_aborted_choice_is_no_selection() -> anyhow::Result<()> {
        let root = tree(&["01-intro/05-tools/problem", "01-intro/05-tools/solution"], &[])?;

        let resolution = selector(root.path(), ScriptedPicker::answering(None)).resolve("05")?;

        assert_eq!(resolution, Resolution::NoSelection);
        Ok(())
    }

    #[test]
    fn test_resolution_errors() -> anyhow::Result<()> {
        let empty = tempfile::tempdir()?;
        let err = selector(empty.path(), ScriptedPicker::default()).resolve("05");
        assert!(matches!(err, Err(ResolutionError::ExercisesDirMissing(_))));

        let root = tree(&["01-intro/05-tools", "01-intro/06-more/problem"], &[])?;
        let mut s = selector(root.path(), ScriptedPicker::default());
        assert!(matches!(s.resolve("42"), Err(ResolutionError::ExerciseNotFound(id)) if id == "42"));
        assert!(matches!(s.resolve("05"), Err(ResolutionError::NoCandidates(_))));

        match s.resolve("06") {
            Err(e @ ResolutionError::MissingEntryFile { .. }) => {
                assert_eq!(
                    e.to_string(),
                    "Could not find main.ts file in problem for exercise 06."
                );
            }
            other => panic!("expected MissingEntryFile, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn test_env_file_arg() {
        let mut entry = EntryPoint {
            working_dir: PathBuf::from("/x"),
            entry_file: PathBuf::from("/x/main.ts"),
            runner: PathBuf::from("tsx"),
            env_file: Some(PathBuf::from("/root/.env")),
        };
        assert_eq!(entry.env_file_arg(), Some(OsString::from("--env-file=/root/.env")));

        entry.env_file = None;
        assert_eq!(entry.env_file_arg(), None);
    }
}
