//! Append-only phase state journal.
//!
//! Markers (see `crate::marker`) decide skip semantics; the journal exists
//! so `reconbox status` can show when each phase last started, completed or
//! failed. One pipe-separated record per transition.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

use crate::phase::PhaseState;

#[derive(Debug, Clone, PartialEq)]
pub struct StateEntry {
    pub phase: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

pub struct StateManager {
    state_file: PathBuf,
}

impl StateManager {
    pub fn new(state_file: PathBuf) -> Self {
        Self { state_file }
    }

    /// Append a `phase|status|timestamp` record.
    pub fn record(&self, phase: &str, status: PhaseState) -> Result<()> {
        if let Some(parent) = self.state_file.parent() {
            fs::create_dir_all(parent).context("Failed to create state directory")?;
        }
        let entry = format!(
            "{}|{}|{}\n",
            phase,
            status.as_str(),
            Utc::now().to_rfc3339()
        );

        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.state_file)
            .context("Failed to open state file")?
            .write_all(entry.as_bytes())
            .context("Failed to write state entry")?;

        Ok(())
    }

    /// All journal entries, oldest first. Malformed lines are skipped.
    pub fn get_entries(&self) -> Result<Vec<StateEntry>> {
        if !self.state_file.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.state_file).context("Failed to read state file")?;

        let entries: Vec<StateEntry> = content
            .lines()
            .filter_map(|line| {
                let parts: Vec<&str> = line.split('|').collect();
                if parts.len() != 3 {
                    return None;
                }
                Some(StateEntry {
                    phase: parts[0].to_string(),
                    status: parts[1].to_string(),
                    timestamp: DateTime::parse_from_rfc3339(parts[2])
                        .ok()?
                        .with_timezone(&Utc),
                })
            })
            .collect();

        Ok(entries)
    }

    /// The most recent status recorded for a phase, if any.
    pub fn last_status(&self, phase: &str) -> Option<String> {
        self.get_entries()
            .ok()?
            .into_iter()
            .rev()
            .find(|e| e.phase == phase)
            .map(|e| e.status)
    }

    pub fn reset(&self) -> Result<()> {
        if self.state_file.exists() {
            fs::remove_file(&self.state_file).context("Failed to remove state file")?;
        }
        Ok(())
    }
}
