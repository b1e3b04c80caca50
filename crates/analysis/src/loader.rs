//! Latency file loading.
//!
//! A results file is read once into a [`LatencyTable`]; its
//! [`RecordFormat`] is decided at that point from the first record and
//! every later question (durations, sizes, stage columns) goes through
//! the tag instead of looking at the file again.

use cardbench_core::{
    Operation, RecordFormat, DURATION_HEADER, REQ_END_COLUMN, REQ_START_COLUMN,
    SIZED_RESPONSE_HEADER, STAGE_COLUMNS,
};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::Result;

/// Which interval a staged pipeline file contributes as its duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurationSource {
    /// Last server stage minus `start_timestamp`
    #[default]
    Server,
    /// `req_end_time - req_start_time` as seen by the caller
    Wall,
}

/// Numeric contents of one results file.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyTable {
    /// Source file
    pub path: PathBuf,
    /// Detected shape
    pub format: RecordFormat,
    /// Header names, empty for headerless files
    pub columns: Vec<String>,
    /// Data rows; empty fields read as NaN
    pub rows: Vec<Vec<f64>>,
}

impl LatencyTable {
    /// Read and classify a file.
    ///
    /// A missing, empty or non-numeric file yields `Ok(None)`.
    pub fn read(path: impl AsRef<Path>) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !path.is_file() {
            debug!(path = %path.display(), "results file not found");
            return Ok(None);
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_path(path)?;

        let mut records: Vec<StringRecord> = Vec::new();
        for record in reader.records() {
            match record {
                Ok(record) if record.iter().all(str::is_empty) => continue,
                Ok(record) => records.push(record),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "unreadable results file skipped");
                    return Ok(None);
                }
            }
        }

        let Some(first) = records.first() else {
            debug!(path = %path.display(), "results file is empty");
            return Ok(None);
        };

        let has_header = first.iter().any(|f| !f.is_empty() && f.parse::<f64>().is_err());
        let (columns, body): (Vec<String>, &[StringRecord]) = if has_header {
            (first.iter().map(str::to_string).collect(), &records[1..])
        } else {
            (Vec::new(), &records[..])
        };
        let format = if has_header {
            RecordFormat::from_header(&columns[..])
        } else if first.len() >= 2 {
            RecordFormat::TimestampPair
        } else {
            RecordFormat::ScalarDuration
        };

        let mut rows = Vec::with_capacity(body.len());
        for (line, record) in body.iter().enumerate() {
            let mut row = Vec::with_capacity(record.len());
            for field in record.iter() {
                if field.is_empty() {
                    row.push(f64::NAN);
                    continue;
                }
                match field.parse::<f64>() {
                    Ok(value) => row.push(value),
                    Err(_) => {
                        warn!(
                            path = %path.display(),
                            record = line + 1,
                            value = field,
                            "non-numeric value, results file skipped"
                        );
                        return Ok(None);
                    }
                }
            }
            rows.push(row);
        }

        if rows.is_empty() {
            debug!(path = %path.display(), "results file has a header but no rows");
            return Ok(None);
        }

        debug!(path = %path.display(), format = ?format, rows = rows.len(), "results file loaded");
        Ok(Some(Self {
            path: path.to_path_buf(),
            format,
            columns,
            rows,
        }))
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a named column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Values of a named column.
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        self.column_index(name).map(|i| self.position(i))
    }

    /// Values at a column position.
    pub fn position(&self, index: usize) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| row.get(index).copied().unwrap_or(f64::NAN))
            .collect()
    }

    /// Per-row durations in seconds.
    ///
    /// Rows without a usable value are dropped, and so are negative
    /// durations, with a warning naming how many were discarded.
    pub fn durations(&self, source: DurationSource) -> Vec<f64> {
        let values = match self.format {
            RecordFormat::TimestampPair => differences(self.position(0), self.position(1)),
            RecordFormat::ScalarDuration => self
                .column(DURATION_HEADER[0])
                .unwrap_or_else(|| self.position(0)),
            RecordFormat::SizedResponse => self
                .column(SIZED_RESPONSE_HEADER[0])
                .unwrap_or_default()
                .into_iter()
                .map(|ms| ms / 1000.0)
                .collect(),
            RecordFormat::SocketTiming => self.column(DURATION_HEADER[0]).unwrap_or_default(),
            RecordFormat::StagedPipeline => self.staged_durations(source),
        };
        let finite: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        let negative = finite.iter().filter(|v| **v < 0.0).count();
        if negative > 0 {
            warn!(
                path = %self.path.display(),
                format = ?self.format,
                negative,
                "negative durations discarded"
            );
        }
        finite.into_iter().filter(|v| *v >= 0.0).collect()
    }

    /// Response sizes in KB, for files that carry them.
    pub fn sizes_kb(&self) -> Option<Vec<f64>> {
        match self.format {
            RecordFormat::SizedResponse => self.column(SIZED_RESPONSE_HEADER[1]),
            _ => None,
        }
    }

    fn staged_durations(&self, source: DurationSource) -> Vec<f64> {
        if source == DurationSource::Wall {
            if let (Some(start), Some(end)) =
                (self.column(REQ_START_COLUMN), self.column(REQ_END_COLUMN))
            {
                return differences(start, end);
            }
            warn!(path = %self.path.display(), "no request time columns, using server stages");
        }
        let last_stage = STAGE_COLUMNS
            .iter()
            .rev()
            .find_map(|name| self.column(name))
            .unwrap_or_default();
        match self.column(STAGE_COLUMNS[0]) {
            Some(start) => differences(start, last_stage),
            None => Vec::new(),
        }
    }
}

fn differences(start: Vec<f64>, end: Vec<f64>) -> Vec<f64> {
    start.into_iter().zip(end).map(|(s, e)| e - s).collect()
}

/// File holding an operation's samples inside a run directory.
///
/// Database baselines name the search file in the singular; that spelling
/// is accepted when the canonical one is absent.
pub fn operation_file(run_dir: impl AsRef<Path>, operation: Operation) -> PathBuf {
    let run_dir = run_dir.as_ref();
    let canonical = run_dir.join(operation.file_name());
    if canonical.is_file() {
        return canonical;
    }
    match operation {
        Operation::SearchModelcards => {
            let singular = run_dir.join("search_modelcard.csv");
            if singular.is_file() {
                singular
            } else {
                canonical
            }
        }
        Operation::GetModelcard => canonical,
    }
}

/// Load an operation's table from a run directory.
pub fn load_table(run_dir: impl AsRef<Path>, operation: Operation) -> Result<Option<LatencyTable>> {
    LatencyTable::read(operation_file(run_dir, operation))
}

/// Durations in seconds for an operation; `None` when there are none.
pub fn load_samples(run_dir: impl AsRef<Path>, operation: Operation) -> Result<Option<Vec<f64>>> {
    load_samples_with(run_dir, operation, DurationSource::Server)
}

/// [`load_samples`] with an explicit duration source for staged files.
pub fn load_samples_with(
    run_dir: impl AsRef<Path>,
    operation: Operation,
    source: DurationSource,
) -> Result<Option<Vec<f64>>> {
    Ok(load_table(run_dir, operation)?
        .map(|table| table.durations(source))
        .filter(|durations| !durations.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_headerless_pair() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "get_modelcard.csv", "10.0,10.25\n20.0,20.5\n");
        let table = LatencyTable::read(&path).unwrap().unwrap();
        assert_eq!(table.format, RecordFormat::TimestampPair);
        assert_eq!(table.durations(DurationSource::Server), vec![0.25, 0.5]);
    }

    #[test]
    fn test_headerless_scalar_and_named_scalar() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "a.csv", "0.1\n0.2\n");
        let table = LatencyTable::read(&path).unwrap().unwrap();
        assert_eq!(table.format, RecordFormat::ScalarDuration);
        assert_eq!(table.durations(DurationSource::Server), vec![0.1, 0.2]);

        let path = write(&tmp, "b.csv", "total_time\n0.3\n");
        let table = LatencyTable::read(&path).unwrap().unwrap();
        assert_eq!(table.format, RecordFormat::ScalarDuration);
        assert_eq!(table.durations(DurationSource::Server), vec![0.3]);
    }

    #[test]
    fn test_sized_response_converts_to_seconds() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "a.csv", "response_time_ms,response_size_kb\n250.0,2.0\n");
        let table = LatencyTable::read(&path).unwrap().unwrap();
        assert_eq!(table.format, RecordFormat::SizedResponse);
        assert_eq!(table.durations(DurationSource::Server), vec![0.25]);
        assert_eq!(table.sizes_kb(), Some(vec![2.0]));
    }

    #[test]
    fn test_staged_server_and_wall_durations() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            &tmp,
            "a.csv",
            "start_timestamp, base_model_card_timestamp, remove_embedding_timestamp, \
             enrich_ai_model_timestamp, enrich_bias_analysis_timestamp, \
             enrich_xai_analysis_timestamp, req_start_time, req_end_time\n\
             100.0, 100.5, 100.5, 101.0, 101.5, 102.0, 99.0, 103.0\n",
        );
        let table = LatencyTable::read(&path).unwrap().unwrap();
        assert_eq!(table.format, RecordFormat::StagedPipeline);
        assert_eq!(table.durations(DurationSource::Server), vec![2.0]);
        assert_eq!(table.durations(DurationSource::Wall), vec![4.0]);
    }

    #[test]
    fn test_socket_timing_uses_total_time() {
        let tmp = TempDir::new().unwrap();
        let path = write(
            &tmp,
            "a.csv",
            "timestamp,dns_lookup,socket_creation,tcp_connect,ssl_context_creation,ssl_handshake,\
             request_send,time_to_first_byte,response_read,socket_close,\
             server_processing,total_time\n\
             1700000000.0,0.001,0,0.002,0,0,0.0001,0.05,0.001,0,0.05,0.06\n",
        );
        let table = LatencyTable::read(&path).unwrap().unwrap();
        assert_eq!(table.format, RecordFormat::SocketTiming);
        assert_eq!(table.durations(DurationSource::Server), vec![0.06]);
    }

    #[test]
    fn test_timestamped_total_time_is_read_by_name() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "a.csv", "timestamp,total_time\n1700000000.0,0.05\n");
        let table = LatencyTable::read(&path).unwrap().unwrap();
        assert_eq!(table.format, RecordFormat::ScalarDuration);
        assert_eq!(table.durations(DurationSource::Server), vec![0.05]);
    }

    #[test]
    fn test_negative_durations_are_discarded() {
        let tmp = TempDir::new().unwrap();
        let path = write(&tmp, "a.csv", "10.0,10.25\n20.0,19.0\n");
        let table = LatencyTable::read(&path).unwrap().unwrap();
        assert_eq!(table.durations(DurationSource::Server), vec![0.25]);

        let only_negative = write(&tmp, "get_modelcard.csv", "5.0,4.0\n");
        assert!(LatencyTable::read(&only_negative).unwrap().is_some());
        assert_eq!(load_samples(tmp.path(), Operation::GetModelcard).unwrap(), None);
    }

    #[test]
    fn test_missing_empty_and_malformed_files() {
        let tmp = TempDir::new().unwrap();
        assert!(LatencyTable::read(tmp.path().join("absent.csv")).unwrap().is_none());
        let empty = write(&tmp, "empty.csv", "");
        assert!(LatencyTable::read(&empty).unwrap().is_none());
        let header_only = write(&tmp, "header.csv", "response_time_ms,response_size_kb\n");
        assert!(LatencyTable::read(&header_only).unwrap().is_none());
        let garbage = write(&tmp, "garbage.csv", "1.0,2.0\nabc,def\n");
        assert!(LatencyTable::read(&garbage).unwrap().is_none());
    }

    #[test]
    fn test_singular_search_file_is_accepted() {
        let tmp = TempDir::new().unwrap();
        write(&tmp, "search_modelcard.csv", "1.0,1.5\n");
        let samples = load_samples(tmp.path(), Operation::SearchModelcards).unwrap();
        assert_eq!(samples, Some(vec![0.5]));
        assert_eq!(load_samples(tmp.path(), Operation::GetModelcard).unwrap(), None);
    }
}
