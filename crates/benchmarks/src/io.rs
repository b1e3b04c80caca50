//! I/O operations for benchmark results.
//!
//! This module creates run directories and the per-operation CSV files
//! inside them, and writes the JSON run report.

use cardbench_core::{BenchError, RunLabel};
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;

/// Report file name inside a run directory.
pub const REPORT_FILE: &str = "report.json";

/// One run's output directory, `<root>/run_<stamp>[/<variant>]`.
#[derive(Debug, Clone)]
pub struct RunDirectory {
    path: PathBuf,
    label: RunLabel,
}

impl RunDirectory {
    /// Create the directory (and the root) for a run.
    pub fn create(root: impl AsRef<Path>, label: RunLabel, variant: Option<&str>) -> Result<Self> {
        let mut path = root.as_ref().join(label.as_str());
        if let Some(variant) = variant {
            path.push(variant);
        }
        fs::create_dir_all(&path)?;
        debug!(path = %path.display(), "run directory ready");
        Ok(Self { path, label })
    }

    /// Directory path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run label.
    pub fn label(&self) -> &RunLabel {
        &self.label
    }

    /// Path of a file inside the run directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }
}

/// Append-only CSV file owned by a single writer.
///
/// The file is created exclusively; every record is appended with its own
/// open, write, flush and close so a crash loses at most the current row.
#[derive(Debug, Clone)]
pub struct CsvSink {
    path: PathBuf,
}

impl CsvSink {
    /// Create the file, writing the header first when there is one.
    pub fn create(path: impl Into<PathBuf>, header: Option<&[&str]>) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::AlreadyExists => BenchError::AlreadyExists(path.clone()),
                _ => BenchError::Io(e),
            })?;
        if let Some(header) = header {
            let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
            writer.write_record(header)?;
            writer.flush()?;
        }
        Ok(Self { path })
    }

    /// File path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record.
    pub fn append<I, T>(&self, record: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
        writer.write_record(record)?;
        writer.flush()?;
        Ok(())
    }
}

/// Write a serializable report as pretty JSON.
pub fn write_report_json<T: Serialize>(report: &T, path: impl AsRef<Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    let mut file = File::create(path)?;
    file.write_all(json.as_bytes())?;
    file.write_all(b"\n")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RunError;
    use tempfile::TempDir;

    #[test]
    fn test_run_directory_with_variant() {
        let tmp = TempDir::new().unwrap();
        let label = RunLabel::daily(chrono::NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
        let dir = RunDirectory::create(tmp.path(), label, Some("native")).unwrap();
        assert_eq!(dir.path(), tmp.path().join("run_20250102").join("native"));
        assert!(dir.path().is_dir());
        assert_eq!(dir.label().as_str(), "run_20250102");
    }

    #[test]
    fn test_sink_writes_header_then_rows() {
        let tmp = TempDir::new().unwrap();
        let sink = CsvSink::create(tmp.path().join("a.csv"), Some(&["x", "y"])).unwrap();
        sink.append(["1", "2"]).unwrap();
        sink.append(["3", "4"]).unwrap();
        let content = fs::read_to_string(sink.path()).unwrap();
        assert_eq!(content, "x,y\n1,2\n3,4\n");
    }

    #[test]
    fn test_headerless_sink_starts_empty() {
        let tmp = TempDir::new().unwrap();
        let sink = CsvSink::create(tmp.path().join("a.csv"), None).unwrap();
        assert_eq!(fs::read_to_string(sink.path()).unwrap(), "");
    }

    #[test]
    fn test_sink_refuses_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.csv");
        CsvSink::create(&path, None).unwrap();
        match CsvSink::create(&path, None) {
            Err(RunError::Bench(BenchError::AlreadyExists(p))) => assert_eq!(p, path),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_write_report_json() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(REPORT_FILE);
        write_report_json(&serde_json::json!({"completed": 3}), &path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["completed"], 3);
    }
}
