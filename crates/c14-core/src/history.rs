//! Run log of merges applied to a store
//!
//! Each run that wrote the store appends one entry; the log is never
//! consulted by the merge itself.

use crate::error::{Error, Result};
use crate::merger::MergeReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Counters recorded for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub sites_inserted: usize,
    pub new_sites: usize,
    pub features_after: usize,
}

/// A record of one run against a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEntry {
    /// When the run finished
    pub timestamp: DateTime<Utc>,
    /// Command that produced the run (enrich, add-site, ...)
    pub command: String,
    /// Store that was written
    pub store: PathBuf,
    /// Where the incoming data came from (URL, file)
    pub source: String,
    pub counts: RunCounts,
}

/// Log file containing all recorded runs, oldest first
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunLog {
    pub entries: Vec<RunEntry>,
}

impl RunLog {
    /// Create a new empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the log from a file, or create empty if not exists
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the log to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn add_entry(&mut self, entry: RunEntry) {
        self.entries.push(entry);
    }

    /// Most recent run against `store`
    pub fn last_for_store(&self, store: &Path) -> Option<&RunEntry> {
        self.entries.iter().rev().find(|e| e.store == store)
    }

    /// Load, append and save in one step
    pub fn append<P: AsRef<Path>>(path: P, entry: RunEntry) -> Result<()> {
        let mut log = Self::load(path.as_ref())?;
        log.add_entry(entry);
        log.save(path)
    }
}

/// Create a log entry from a merge report
pub fn create_run_entry(
    command: &str,
    store: &Path,
    source: &str,
    report: &MergeReport,
    features_after: usize,
) -> RunEntry {
    RunEntry {
        timestamp: Utc::now(),
        command: command.to_string(),
        store: store.to_path_buf(),
        source: source.to_string(),
        counts: RunCounts {
            inserted: report.inserted,
            updated: report.updated,
            unchanged: report.unchanged,
            skipped: report.skipped,
            sites_inserted: report.sites_inserted,
            new_sites: report.new_site_names.len(),
            features_after,
        },
    }
}
