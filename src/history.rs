//! Append-only search history, one JSON record per line.

use crate::core::engine::SearchOutcome;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub id: String,
    pub title: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub timestamp: String,
    pub source: String,
    pub digest: String,
    pub matches: Vec<MatchSummary>,
}

impl SearchRecord {
    pub fn from_outcome(source: &str, outcome: &SearchOutcome) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            source: source.to_string(),
            digest: outcome.digest.clone(),
            matches: outcome
                .matches
                .iter()
                .map(|m| MatchSummary {
                    id: m.item.id.clone(),
                    title: m.item.title.clone(),
                    score: m.score,
                })
                .collect(),
        }
    }
}

pub struct SearchHistory {
    path: PathBuf,
}

impl SearchHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data_dir>/lostfound/history.jsonl`
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("lostfound").join("history.jsonl"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, record: &SearchRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
        let mut out = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open history file {:?}", self.path))?;
        writeln!(out, "{}", serde_json::to_string(record)?)?;
        Ok(())
    }

    /// Readable records in file order. Malformed lines are skipped.
    pub fn records(&self) -> Result<Vec<SearchRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let f = File::open(&self.path)
            .with_context(|| format!("Could not open history file {:?}", self.path))?;

        let mut records = Vec::new();
        for (i, line) in BufReader::new(f).split(b'\n').enumerate() {
            let line = line?;
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<SearchRecord>(&line) {
                Ok(rec) => records.push(rec),
                Err(err) => log::warn!("Skipping malformed history entry {}: {}", i, err),
            }
        }
        Ok(records)
    }

    /// Remove all records, returning how many there were.
    pub fn clear(&self) -> Result<usize> {
        let count = self.records()?.len();
        if self.path.exists() {
            fs::write(&self.path, "")
                .with_context(|| format!("Failed to clear history file {:?}", self.path))?;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(source: &str) -> SearchRecord {
        SearchRecord {
            timestamp: "2026-01-01T00:00:00+00:00".into(),
            source: source.into(),
            digest: "ab".repeat(32),
            matches: vec![MatchSummary {
                id: "phone".into(),
                title: "Black iPhone".into(),
                score: 0.44,
            }],
        }
    }

    #[test]
    fn test_append_and_read() {
        let temp_dir = TempDir::new().unwrap();
        let history = SearchHistory::new(temp_dir.path().join("nested").join("history.jsonl"));

        history.append(&record("a.jpg")).unwrap();
        history.append(&record("b.jpg")).unwrap();

        let records = history.records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].source, "a.jpg");
        assert_eq!(records[1], record("b.jpg"));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let history = SearchHistory::new(temp_dir.path().join("history.jsonl"));
        assert!(history.records().unwrap().is_empty());
        assert_eq!(history.clear().unwrap(), 0);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("history.jsonl");
        let good = serde_json::to_string(&record("ok.jpg")).unwrap();
        fs::write(&path, format!("{}\n{{broken\n\n{}\n", good, good)).unwrap();

        let history = SearchHistory::new(&path);
        assert_eq!(history.records().unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_utf8_line_is_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("history.jsonl");
        let good = serde_json::to_string(&record("ok.jpg")).unwrap();

        let mut bytes = good.clone().into_bytes();
        bytes.extend_from_slice(b"\n\xff\xfe{\"source\": \"x\"}\n");
        bytes.extend_from_slice(good.as_bytes());
        bytes.push(b'\n');
        fs::write(&path, bytes).unwrap();

        let records = SearchHistory::new(&path).records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].source, "ok.jpg");
    }

    #[test]
    fn test_clear() {
        let temp_dir = TempDir::new().unwrap();
        let history = SearchHistory::new(temp_dir.path().join("history.jsonl"));
        history.append(&record("a.jpg")).unwrap();

        assert_eq!(history.clear().unwrap(), 1);
        assert!(history.records().unwrap().is_empty());
    }
}
