//! Phase-completion markers.
//!
//! A marker is a zero-byte file in the stage-3 directory whose existence
//! records that an enumeration phase has completed for one host source.
//! Markers are the only state consulted when deciding whether to skip a
//! phase; deleting one (or passing --force-phase) is how an operator forces
//! a re-run.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::errors::PhaseError;

/// Which upstream discovery mechanism produced a hosts file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceTag {
    Masscan,
    Leftover,
    Unknown,
}

impl SourceTag {
    /// Classify a hosts-file path by case-insensitive substring match.
    /// Masscan is checked before leftover, so a path containing both
    /// substrings classifies as masscan.
    pub fn from_hosts_path(path: &Path) -> Self {
        let lowered = path.to_string_lossy().to_lowercase();
        if lowered.contains("masscan") {
            Self::Masscan
        } else if lowered.contains("leftover") {
            Self::Leftover
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Masscan => "masscan",
            Self::Leftover => "leftover",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filesystem-backed ledger of phase completion.
#[derive(Debug, Clone)]
pub struct MarkerStore {
    stage_dir: PathBuf,
}

impl MarkerStore {
    pub fn new(stage_dir: PathBuf) -> Self {
        Self { stage_dir }
    }

    /// Marker path for a phase/source combination, e.g.
    /// `<stage_dir>/.autorecon_masscan`.
    pub fn marker_path(&self, phase: &str, tag: SourceTag) -> PathBuf {
        self.stage_dir.join(format!(".{}_{}", phase, tag.as_str()))
    }

    pub fn exists(&self, phase: &str, tag: SourceTag) -> bool {
        self.marker_path(phase, tag).exists()
    }

    /// Touch the marker, creating the stage directory tree first.
    /// Idempotent: re-creating an existing marker succeeds and leaves a
    /// single file.
    pub fn create(&self, phase: &str, tag: SourceTag) -> Result<PathBuf, PhaseError> {
        std::fs::create_dir_all(&self.stage_dir).map_err(|source| PhaseError::MarkerWrite {
            path: self.stage_dir.clone(),
            source,
        })?;
        let path = self.marker_path(phase, tag);
        std::fs::File::create(&path).map_err(|source| PhaseError::MarkerWrite {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// All markers currently present for a phase, in tag order.
    pub fn present(&self, phase: &str) -> Vec<SourceTag> {
        [SourceTag::Masscan, SourceTag::Leftover, SourceTag::Unknown]
            .into_iter()
            .filter(|tag| self.exists(phase, *tag))
            .collect()
    }
}
