//! Persisted Reports
//!
//! Reports are written once per run as `<dir>/<prefix>.<run-id>.json`. A
//! run identifier is a fixed part (device identity) followed by `_` and a
//! local `%Y-%m-%d-%H%M%S` stamp, so the history of one device is every file
//! sharing the fixed part, and the newest is the one with the highest stamp.

use crate::json::parse_json_report;
use chrono::{Local, NaiveDateTime};
use fluxrig_core::ScopeResults;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Format of the timestamp suffix of a run identifier
pub const STAMP_FORMAT: &str = "%Y-%m-%d-%H%M%S";

/// Failure reading or writing a persisted report
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Filesystem error
    #[error("cannot access {path}: {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The file is not a valid report
    #[error("malformed report {path}: {source}")]
    Json {
        /// Report file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },
}

/// Result of scanning the archive for one device's history
#[derive(Debug, Default, Clone, PartialEq)]
pub struct HistoryScan {
    /// Newest matching report and its stamp
    pub latest: Option<(NaiveDateTime, PathBuf)>,
    /// Matching file names whose stamp could not be parsed
    pub malformed: Vec<String>,
}

/// Directory of persisted reports sharing a file name prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArchive {
    dir: PathBuf,
    prefix: String,
}

impl ReportArchive {
    /// Archive rooted at `dir`, naming files `<prefix>.<run-id>.json`
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Report directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name prefix
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Append the current local time to a fixed run identifier
    pub fn stamp_run_id(fixed: &str) -> String {
        Self::stamp_run_id_at(fixed, Local::now().naive_local())
    }

    /// Append `at` to a fixed run identifier
    pub fn stamp_run_id_at(fixed: &str, at: NaiveDateTime) -> String {
        format!("{}_{}", fixed, at.format(STAMP_FORMAT))
    }

    /// File name of the report for `run_id`
    pub fn file_name(&self, run_id: &str) -> String {
        format!("{}.{}.json", self.prefix, run_id)
    }

    /// Full path of the report for `run_id`
    pub fn path_for(&self, run_id: &str) -> PathBuf {
        self.dir.join(self.file_name(run_id))
    }

    /// Write a serialized report, creating the directory when needed
    pub fn write(&self, run_id: &str, contents: &str) -> Result<PathBuf, ArchiveError> {
        fs::create_dir_all(&self.dir).map_err(|source| ArchiveError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let path = self.path_for(run_id);
        fs::write(&path, contents).map_err(|source| ArchiveError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "report written");
        Ok(path)
    }

    /// Read a persisted report
    pub fn read(&self, path: &Path) -> Result<ScopeResults, ArchiveError> {
        let text = fs::read_to_string(path).map_err(|source| ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        parse_json_report(&text).map_err(|source| ArchiveError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Find the newest report whose run identifier starts with `fixed`.
    ///
    /// A missing directory is an empty history.
    pub fn scan(&self, fixed: &str) -> Result<HistoryScan, ArchiveError> {
        let mut scan = HistoryScan::default();
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(scan),
            Err(source) => {
                return Err(ArchiveError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let head = format!("{}.{}_", self.prefix, fixed);
        for entry in entries {
            let entry = entry.map_err(|source| ArchiveError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(stamp) = name
                .strip_prefix(&head)
                .and_then(|rest| rest.strip_suffix(".json"))
            else {
                continue;
            };

            match NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT) {
                Ok(at) => {
                    if scan.latest.as_ref().is_none_or(|(best, _)| at > *best) {
                        scan.latest = Some((at, entry.path()));
                    }
                }
                Err(_) => scan.malformed.push(name),
            }
        }
        scan.malformed.sort();
        Ok(scan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_stamp_and_file_name() {
        let archive = ReportArchive::new("out", "bts-test");
        let run_id = ReportArchive::stamp_run_id_at("UmTRX_1234", at(13, 45, 1));
        assert_eq!(run_id, "UmTRX_1234_2024-03-09-134501");
        assert_eq!(
            archive.file_name(&run_id),
            "bts-test.UmTRX_1234_2024-03-09-134501.json"
        );
        assert_eq!(archive.path_for(&run_id), Path::new("out").join(archive.file_name(&run_id)));
    }

    #[test]
    fn test_scan_picks_highest_stamp() {
        let dir = tempfile::tempdir().unwrap();
        let archive = ReportArchive::new(dir.path(), "bts-test");
        for stamp in [at(9, 0, 0), at(23, 59, 59), at(10, 30, 0)] {
            archive
                .write(&ReportArchive::stamp_run_id_at("rig", stamp), "{}")
                .unwrap();
        }
        archive.write("other_2030-01-01-000000", "{}").unwrap();
        fs::write(dir.path().join("bts-test.rig_garbage.json"), "{}").unwrap();

        let scan = archive.scan("rig").unwrap();
        let (best, path) = scan.latest.unwrap();
        assert_eq!(best, at(23, 59, 59));
        assert!(path.ends_with("bts-test.rig_2024-03-09-235959.json"));
        assert_eq!(scan.malformed, vec!["bts-test.rig_garbage.json".to_string()]);
    }

    #[test]
    fn test_scan_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let archive = ReportArchive::new(dir.path().join("nope"), "bts-test");
        assert_eq!(archive.scan("rig").unwrap(), HistoryScan::default());
    }

    #[test]
    fn test_read_rejects_malformed_report() {
        let dir = tempfile::tempdir().unwrap();
        let archive = ReportArchive::new(dir.path(), "bts-test");
        let path = archive.write("rig_2024-03-09-000000", "not json").unwrap();
        assert!(matches!(archive.read(&path), Err(ArchiveError::Json { .. })));
    }
}
