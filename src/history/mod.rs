//! Transcript history on disk.
//!
//! Delivered transcripts are appended to a per-day JSON file
//! (`YYYY-MM-DD.json`) holding an array of records. History is best-effort:
//! a write failure is logged and the delivery still counts as successful.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// HistoryError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to create history directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write history file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize history: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// TranscriptRecord
// ---------------------------------------------------------------------------

/// One delivered transcript as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptRecord {
    pub role: String,
    pub content: String,
    /// RFC 3339 local timestamp.
    pub timestamp: String,
}

impl TranscriptRecord {
    fn now(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
            timestamp: Local::now().to_rfc3339(),
        }
    }
}

// ---------------------------------------------------------------------------
// TranscriptLog
// ---------------------------------------------------------------------------

/// Append-only transcript log, one JSON file per calendar day.
pub struct TranscriptLog {
    dir: PathBuf,
}

impl TranscriptLog {
    /// Open (and create if needed) the history directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, HistoryError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| HistoryError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Append a delivered transcript to today's file. Empty text is ignored.
    pub fn append(&self, text: &str) -> Result<(), HistoryError> {
        if text.trim().is_empty() {
            return Ok(());
        }
        let file = self.dir.join(format!("{}.json", Local::now().format("%Y-%m-%d")));
        self.append_to(&file, text)
    }

    fn append_to(&self, file: &Path, text: &str) -> Result<(), HistoryError> {
        let mut records = read_records(file);
        records.push(TranscriptRecord::now(text));

        let json = serde_json::to_string_pretty(&records)?;
        fs::write(file, json).map_err(|source| HistoryError::Write {
            path: file.to_path_buf(),
            source,
        })?;

        log::debug!("history: {} record(s) in {}", records.len(), file.display());
        Ok(())
    }
}

/// Load the day's existing records. A missing file starts a fresh array; a
/// corrupt one is logged and overwritten rather than aborting the append.
fn read_records(file: &Path) -> Vec<TranscriptRecord> {
    let Ok(contents) = fs::read_to_string(file) else {
        return Vec::new();
    };
    match serde_json::from_str(&contents) {
        Ok(records) => records,
        Err(e) => {
            log::warn!(
                "history file {} is corrupt ({e}), starting a fresh array",
                file.display()
            );
            Vec::new()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn today_file(dir: &Path) -> PathBuf {
        dir.join(format!("{}.json", Local::now().format("%Y-%m-%d")))
    }

    #[test]
    fn append_creates_daily_file_with_one_record() {
        let tmp = tempfile::tempdir().unwrap();
        let log = TranscriptLog::new(tmp.path()).unwrap();

        log.append("hello world").unwrap();

        let contents = fs::read_to_string(today_file(tmp.path())).unwrap();
        let records: Vec<TranscriptRecord> = serde_json::from_str(&contents).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].role, "user");
        assert_eq!(records[0].content, "hello world");
        assert!(!records[0].timestamp.is_empty());
    }

    #[test]
    fn append_extends_the_existing_array() {
        let tmp = tempfile::tempdir().unwrap();
        let log = TranscriptLog::new(tmp.path()).unwrap();

        log.append("first").unwrap();
        log.append("second").unwrap();

        let contents = fs::read_to_string(today_file(tmp.path())).unwrap();
        let records: Vec<TranscriptRecord> = serde_json::from_str(&contents).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].content, "first");
        assert_eq!(records[1].content, "second");
    }

    #[test]
    fn empty_text_is_not_recorded() {
        let tmp = tempfile::tempdir().unwrap();
        let log = TranscriptLog::new(tmp.path()).unwrap();

        log.append("   ").unwrap();

        assert!(!today_file(tmp.path()).exists());
    }

    #[test]
    fn corrupt_file_is_replaced_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let log = TranscriptLog::new(tmp.path()).unwrap();

        fs::write(today_file(tmp.path()), "{ not valid json").unwrap();
        log.append("recovered").unwrap();

        let contents = fs::read_to_string(today_file(tmp.path())).unwrap();
        let records: Vec<TranscriptRecord> = serde_json::from_str(&contents).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content, "recovered");
    }

    #[test]
    fn new_creates_missing_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a/b/history");
        TranscriptLog::new(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
