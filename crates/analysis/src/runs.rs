//! Run directory selection.

use cardbench_core::{BenchError, RunLabel};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Run directories directly under `root`, oldest first.
///
/// Labels sort lexicographically in time order, so name order is run order.
pub fn list_runs(root: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(BenchError::DirectoryNotFound(root.to_path_buf()).into());
    }

    let mut runs = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let is_run = entry
            .file_name()
            .to_str()
            .map(RunLabel::is_run_name)
            .unwrap_or(false);
        if is_run && entry.file_type()?.is_dir() {
            runs.push(entry.path());
        }
    }
    runs.sort();
    Ok(runs)
}

/// The most recent run under `root`.
///
/// A root without any run directory is itself treated as the run, which
/// supports flat result layouts.
pub fn latest_run_dir(root: impl AsRef<Path>) -> Result<PathBuf> {
    let root = root.as_ref();
    Ok(list_runs(root)?
        .pop()
        .unwrap_or_else(|| root.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use tempfile::TempDir;

    #[test]
    fn test_latest_label_wins() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("run_20250101_000000")).unwrap();
        fs::create_dir(tmp.path().join("run_20250102_000000")).unwrap();
        fs::create_dir(tmp.path().join("other")).unwrap();
        fs::write(tmp.path().join("run_20991231_000000"), "a file, not a run").unwrap();

        let latest = latest_run_dir(tmp.path()).unwrap();
        assert_eq!(latest, tmp.path().join("run_20250102_000000"));
        assert_eq!(list_runs(tmp.path()).unwrap().len(), 2);
    }

    #[test]
    fn test_flat_root_is_its_own_run() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("get_modelcard.csv"), "1,2\n").unwrap();
        assert_eq!(latest_run_dir(tmp.path()).unwrap(), tmp.path());
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        match latest_run_dir(&missing) {
            Err(AnalysisError::Bench(BenchError::DirectoryNotFound(p))) => assert_eq!(p, missing),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
