//! Append-only validation journal (one JSON object per line)

use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, info};

use super::validation::ValidationReport;
use crate::validator::config::JournalConfig;
use crate::validator::{BlockData, Decision, Result, ValidatorError};

/// One journal line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unix seconds
    pub timestamp: f64,
    pub block_height: u64,
    pub block_hash: String,
    pub tx_count: u64,
    pub miner: String,
    pub ai_score: f64,
    pub ai_decision: Decision,
    pub ai_confidence: f64,
    pub validator_model: String,
}

impl JournalEntry {
    pub fn new(block: &BlockData, report: &ValidationReport) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis() as f64 / 1000.0,
            block_height: block.height,
            block_hash: or_unknown(&block.hash),
            tx_count: block.tx_count,
            miner: or_unknown(&block.miner),
            ai_score: report.score,
            ai_decision: report.decision,
            ai_confidence: report.confidence,
            validator_model: report.model.clone(),
        }
    }
}

fn or_unknown(value: &str) -> String {
    if value.is_empty() {
        "unknown".to_string()
    } else {
        value.to_string()
    }
}

/// JSONL writer; appends are serialized through an internal lock
#[derive(Debug)]
pub struct ValidationJournal {
    path: PathBuf,
    enabled: bool,
    write_lock: Mutex<()>,
}

impl ValidationJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            enabled: true,
            write_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &JournalConfig) -> Self {
        Self {
            path: config.path(),
            enabled: config.enabled,
            write_lock: Mutex::new(()),
        }
    }

    /// Journal that never writes
    pub fn disabled() -> Self {
        Self {
            path: PathBuf::new(),
            enabled: false,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Append one entry, creating the log directory on first use
    pub fn append(&self, entry: &JournalEntry) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let line = serde_json::to_string(entry)?;

        let _guard = self.write_lock.lock().map_err(|_| ValidatorError::LockPoisoned)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// Append and log the outcome; failures never propagate
    pub fn log_validation(&self, block: &BlockData, report: &ValidationReport) -> bool {
        let entry = JournalEntry::new(block, report);
        match self.append(&entry) {
            Ok(()) => {
                if self.enabled {
                    info!(
                        "Logged validation - Height: {}, Score: {:.3}",
                        entry.block_height, entry.ai_score
                    );
                }
                true
            }
            Err(e) => {
                error!("Journal write to {} failed: {}", self.path.display(), e);
                false
            }
        }
    }

    /// Parse every entry currently in the journal
    pub fn read_entries(&self) -> Result<Vec<JournalEntry>> {
        if !self.enabled {
            return Ok(Vec::new());
        }
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(ValidatorError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn report(height: u64, decision: Decision) -> ValidationReport {
        ValidationReport {
            score: 0.42,
            decision,
            confidence: 0.16,
            blocks_processed: height,
            anomalies_detected: 0,
            success_rate: 1.0,
            feature_count: 30,
            model: "dense_mlp".to_string(),
            block_height: height,
            block_hash: String::new(),
        }
    }

    #[test]
    fn test_append_creates_directory_and_lines() {
        let dir = TempDir::new().unwrap();
        let journal = ValidationJournal::new(dir.path().join("data").join("block_validations.jsonl"));

        for height in 1..=3 {
            let block = BlockData { height, tx_count: 7, ..BlockData::default() };
            assert!(journal.log_validation(&block, &report(height, Decision::Review)));
        }

        let entries = journal.read_entries().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].block_height, 3);
        assert_eq!(entries[0].block_hash, "unknown");
        assert_eq!(entries[0].miner, "unknown");
        assert_eq!(entries[0].tx_count, 7);
        assert_eq!(entries[0].ai_decision, Decision::Review);

        let raw = std::fs::read_to_string(journal.path()).unwrap();
        assert!(raw.lines().all(|l| l.contains("\"ai_decision\":\"review\"")));
    }

    #[test]
    fn test_disabled_journal_writes_nothing() {
        let journal = ValidationJournal::disabled();
        assert!(journal.log_validation(&BlockData::default(), &report(1, Decision::Accept)));
        assert!(journal.read_entries().unwrap().is_empty());
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let dir = TempDir::new().unwrap();
        // a directory in place of the file makes the open fail
        let path = dir.path().join("blocked");
        std::fs::create_dir(&path).unwrap();
        let journal = ValidationJournal::new(&path);

        assert!(!journal.log_validation(&BlockData::default(), &report(1, Decision::Reject)));
    }
}
