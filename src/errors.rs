//! Typed error hierarchy for the reconbox orchestrator.
//!
//! Three top-level enums cover the three subsystems:
//! - `ConfigError` — project resolution, settings files, target verification
//! - `SessionError` — tmux session probing, creation, attach, and I/O
//! - `PhaseError` — per-phase execution failures

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building the runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No project directory given. Pass --project <dir> or --here")]
    NoProjectDir,

    #[error("Failed to resolve project directory {path}: {source}")]
    ProjectDirUnresolvable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read settings file {path}: {source}")]
    SettingsReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings JSON {path}: {source}")]
    SettingsParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No hosts file found under {dir} (expected *hosts*.txt, or pass --hosts)")]
    NoHostsFile { dir: PathBuf },

    #[error("Target {target} is not an IP and does not resolve")]
    DeadTarget { target: String },

    #[error("Failed to read target list {path}: {source}")]
    TargetListUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the tmux session subsystem.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to probe for tmux session {name}: {source}")]
    ProbeFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create tmux session {name}: {source}")]
    CreateFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("tmux refused to create session {name} (exit code {exit_code})")]
    CreateRejected { name: String, exit_code: i32 },

    #[error("Failed to attach output capture for session {name}: {source}")]
    AttachFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to send keys to session {name}: {source}")]
    SendFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read session capture {path}: {source}")]
    CaptureIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Session {name} is not attached; call open() first")]
    NotAttached { name: String },
}

/// Errors from a single phase execution.
#[derive(Debug, Error)]
pub enum PhaseError {
    #[error("{feature} is not implemented")]
    FeatureNotImplemented { feature: String },

    #[error("Failed to spawn scan tool for phase {phase}: {source}")]
    SpawnFailed {
        phase: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Scan tool exited with non-zero code {exit_code} in phase {phase}")]
    ToolNonZeroExit { phase: String, exit_code: i32 },

    #[error("Failed to write marker {path}: {source}")]
    MarkerWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Monitor timed out in phase {phase} after {seen} of {expected} targets")]
    MonitorTimedOut {
        phase: String,
        seen: usize,
        expected: usize,
    },

    #[error("Monitoring of phase {phase} interrupted by operator")]
    Interrupted { phase: String },

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PhaseError {
    /// Fail-fast constructor for features the original tool never shipped.
    pub fn not_implemented(feature: &str) -> Self {
        Self::FeatureNotImplemented {
            feature: feature.to_string(),
        }
    }
}
