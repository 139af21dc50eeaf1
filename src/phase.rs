//! Phase definition for the recon pipeline.
//!
//! A phase is one sequential stage: a single enumeration run fed by one
//! hosts file. Its completion is recorded by a marker file (see
//! `crate::marker`), so the state computed here at orchestration start is
//! `Completed` for already-markered phases unless a force re-run was
//! requested.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::marker::{MarkerStore, SourceTag};

/// Lifecycle of a phase within one orchestrator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl PhaseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// One pipeline stage: an enumeration run over a single hosts file.
#[derive(Debug, Clone)]
pub struct Phase {
    /// Tool name, used as the marker prefix (e.g. "autorecon").
    pub name: String,
    /// Hosts file feeding this phase.
    pub hosts_file: PathBuf,
    /// Which discovery mechanism produced the hosts file.
    pub source: SourceTag,
    /// Tool output directory (project-relative recon/hosts).
    pub output_dir: PathBuf,
    state: PhaseState,
}

impl Phase {
    pub fn new(name: &str, hosts_file: PathBuf, output_dir: PathBuf) -> Self {
        let source = SourceTag::from_hosts_path(&hosts_file);
        Self {
            name: name.to_string(),
            hosts_file,
            source,
            output_dir,
            state: PhaseState::Pending,
        }
    }

    pub fn state(&self) -> PhaseState {
        self.state
    }

    /// Compute the initial state from the marker ledger. An existing marker
    /// means `Completed` (skip), unless `force` resets it to `Pending`.
    pub fn resolve_initial_state(&mut self, store: &MarkerStore, force: bool) -> PhaseState {
        self.state = if store.exists(&self.name, self.source) && !force {
            PhaseState::Completed
        } else {
            PhaseState::Pending
        };
        self.state
    }

    pub fn start(&mut self) {
        self.state = PhaseState::Running;
    }

    pub fn complete(&mut self) {
        self.state = PhaseState::Completed;
    }

    pub fn fail(&mut self) {
        self.state = PhaseState::Failed;
    }

    /// Display label, e.g. "autorecon (masscan)".
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn phase_for(hosts: &str) -> Phase {
        Phase::new(
            "autorecon",
            PathBuf::from(hosts),
            PathBuf::from("recon/hosts"),
        )
    }

    #[test]
    fn new_phase_is_pending_and_tagged() {
        let phase = phase_for("/tmp/masscan_output.txt");
        assert_eq!(phase.state(), PhaseState::Pending);
        assert_eq!(phase.source, SourceTag::Masscan);
        assert_eq!(phase.label(), "autorecon (masscan)");
    }

    #[test]
    fn marker_present_resolves_completed() {
        let dir = tempdir().unwrap();
        let store = MarkerStore::new(dir.path().to_path_buf());
        store.create("autorecon", SourceTag::Masscan).unwrap();

        let mut phase = phase_for("/tmp/masscan_output.txt");
        assert_eq!(
            phase.resolve_initial_state(&store, false),
            PhaseState::Completed
        );
    }

    #[test]
    fn force_resets_completed_to_pending() {
        let dir = tempdir().unwrap();
        let store = MarkerStore::new(dir.path().to_path_buf());
        store.create("autorecon", SourceTag::Masscan).unwrap();

        let mut phase = phase_for("/tmp/masscan_output.txt");
        assert_eq!(
            phase.resolve_initial_state(&store, true),
            PhaseState::Pending
        );
    }

    #[test]
    fn no_marker_resolves_pending() {
        let dir = tempdir().unwrap();
        let store = MarkerStore::new(dir.path().to_path_buf());

        let mut phase = phase_for("/tmp/leftover.txt");
        assert_eq!(
            phase.resolve_initial_state(&store, false),
            PhaseState::Pending
        );
    }

    #[test]
    fn transitions_follow_the_state_machine() {
        let mut phase = phase_for("/tmp/hosts.txt");
        phase.start();
        assert_eq!(phase.state(), PhaseState::Running);
        phase.complete();
        assert_eq!(phase.state(), PhaseState::Completed);

        let mut failing = phase_for("/tmp/hosts.txt");
        failing.start();
        failing.fail();
        assert_eq!(failing.state(), PhaseState::Failed);
    }
}
