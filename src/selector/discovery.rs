//! Exercise lookup on disk.
//!
//! Layout: `<exercises>/<section>/<exercise>/<candidate>/<entry file>`. An
//! identifier matches an exercise whose directory name contains it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Finds the first exercise directory whose name contains `identifier`.
///
/// Sections and exercises are visited in lexical order, and the search stops
/// at the first section with a match.
pub fn find_exercise(exercises_dir: &Path, identifier: &str) -> io::Result<Option<PathBuf>> {
    for (_, section) in subdirectories(exercises_dir)? {
        let found = subdirectories(&section)?
            .into_iter()
            .find(|(name, _)| name.contains(identifier));
        if let Some((name, path)) = found {
            tracing::debug!(section = %section.display(), exercise = %name, "exercise matched");
            return Ok(Some(path));
        }
    }
    Ok(None)
}

/// Names of the candidate implementations inside an exercise, sorted.
pub fn list_candidates(exercise_dir: &Path) -> io::Result<Vec<String>> {
    Ok(subdirectories(exercise_dir)?
        .into_iter()
        .map(|(name, _)| name)
        .collect())
}

/// Subdirectories of `dir` as `(name, path)`, sorted by name. Plain files and
/// entries with non-UTF-8 names are skipped.
fn subdirectories(dir: &Path) -> io::Result<Vec<(String, PathBuf)>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            dirs.push((name, entry.path()));
        }
    }
    dirs.sort();
    Ok(dirs)
}
