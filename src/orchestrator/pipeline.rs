//! Sequential phase orchestration.
//!
//! One enumeration phase per hosts source, run strictly in order: a phase
//! only starts once its predecessor completed or was skipped via an
//! existing marker. Completion is recorded in the marker ledger; failures
//! stop the pipeline and are surfaced to the caller without retry, because
//! blindly re-running long side-effecting scans is unsafe.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use tokio::time::Instant;
use tracing::{info, warn};

use super::runner::ToolRunner;
use super::state::StateManager;
use crate::config::Config;
use crate::errors::{ConfigError, PhaseError};
use crate::marker::MarkerStore;
use crate::phase::{Phase, PhaseState};
use crate::session::{SessionDriver, TmuxBackend};
use crate::ui::ReconUI;

/// Per-run options resolved from the CLI.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Re-run phases even when their completion marker exists.
    pub force: bool,
    /// Use the session-driven monitored invocation style.
    pub watch: bool,
    /// Explicit hosts file, bypassing auto-discovery.
    pub hosts_file: Option<PathBuf>,
    /// Group hosts by their original target. Never shipped upstream.
    pub targets_file: Option<PathBuf>,
    /// Scan-parameter config for the tool itself. Never shipped upstream.
    pub scan_params: Option<PathBuf>,
}

pub struct ReconPipeline {
    config: Config,
    store: MarkerStore,
    state: StateManager,
    opts: PipelineOptions,
}

impl ReconPipeline {
    pub fn new(config: Config, opts: PipelineOptions) -> Self {
        let store = MarkerStore::new(config.stage_dir.clone());
        let state = StateManager::new(config.state_file.clone());
        Self {
            config,
            store,
            state,
            opts,
        }
    }

    /// Build the phase list: one enumeration phase per hosts source, either
    /// the explicit `--hosts` file or every discovered `recon/*hosts*.txt`.
    pub fn assemble_phases(&self) -> Result<Vec<Phase>, ConfigError> {
        let hosts_files = match &self.opts.hosts_file {
            Some(path) => vec![path.clone()],
            None => self.config.find_hosts_files()?,
        };
        Ok(hosts_files
            .into_iter()
            .map(|hosts| Phase::new("autorecon", hosts, self.config.hosts_output_dir.clone()))
            .collect())
    }

    /// Run every pending phase in order. Returns the phases with their
    /// final states; the first failure aborts the rest.
    pub async fn run(&self, ui: &ReconUI) -> Result<Vec<Phase>, PhaseError> {
        // Features the upstream tool never shipped fail before any phase starts
        if self.opts.targets_file.is_some() {
            return Err(PhaseError::not_implemented(
                "Grouping hosts by original target",
            ));
        }
        if self.opts.scan_params.is_some() {
            return Err(PhaseError::not_implemented(
                "Scan-parameter config for the enumeration tool",
            ));
        }

        self.config
            .ensure_directories()
            .context("Failed to create project directories")?;

        let mut phases = self.assemble_phases().map_err(anyhow::Error::new)?;

        for phase in &mut phases {
            if phase.resolve_initial_state(&self.store, self.opts.force) == PhaseState::Completed {
                info!(phase = phase.label(), "marker present, skipping");
                ui.phase_skipped(&phase.label());
                continue;
            }

            ui.print_phase_header(&phase.label(), &phase.hosts_file);
            ui.start_phase(&phase.label());
            phase.start();
            self.state.record(&phase.label(), PhaseState::Running)?;

            let result = if self.opts.watch {
                self.run_monitored(phase, ui).await
            } else {
                ToolRunner::new(self.config.clone())
                    .run_blocking(phase, Some(ui))
                    .await
                    .map(|_| ())
            };

            match result {
                Ok(()) => {
                    let marker = self.store.create(&phase.name, phase.source)?;
                    phase.complete();
                    self.state.record(&phase.label(), PhaseState::Completed)?;
                    info!(
                        phase = phase.label(),
                        marker = %marker.display(),
                        "phase complete"
                    );
                    ui.phase_complete(&phase.label());
                }
                Err(err) => {
                    phase.fail();
                    self.state.record(&phase.label(), PhaseState::Failed)?;
                    ui.phase_failed(&phase.label(), &err.to_string());
                    return Err(err);
                }
            }
        }

        Ok(phases)
    }

    /// Session-driven invocation: launch the tool inside the persistent
    /// session and poll its output until every expected target has
    /// finished, the deadline passes, or the operator interrupts.
    ///
    /// Cancellation never terminates the session process — it injects the
    /// interrupt sequence, leaving the session reusable.
    async fn run_monitored(&self, phase: &Phase, ui: &ReconUI) -> Result<(), PhaseError> {
        let expected = read_expected_targets(&phase.hosts_file)?;

        let backend = TmuxBackend::new(&self.config.session_name, &self.config.log_dir);
        let mut driver = SessionDriver::new(Box::new(backend));
        driver.open().await?;
        driver
            .send_line(&self.config.tool_command_line(&phase.hosts_file))
            .await?;
        ui.log_step(&format!(
            "monitoring session '{}' for {} targets",
            self.config.session_name,
            expected.len()
        ));

        let interrupted = Arc::new(AtomicBool::new(false));
        {
            let flag = interrupted.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    flag.store(true, Ordering::SeqCst);
                }
            });
        }

        let deadline = Instant::now() + self.config.monitor_timeout;
        let mut remaining: HashSet<String> = expected.iter().cloned().collect();

        loop {
            if interrupted.load(Ordering::SeqCst) {
                warn!(phase = phase.label(), "operator interrupt, stopping foreground scan");
                driver.kill().await?;
                return Err(PhaseError::Interrupted {
                    phase: phase.label(),
                });
            }

            for target in driver.check_finished_scans(self.config.poll_timeout).await? {
                remaining.remove(&target);
                ui.host_finished(&target, driver.finished_count(), expected.len());
            }

            if remaining.is_empty() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                warn!(phase = phase.label(), "monitor deadline passed, stopping foreground scan");
                driver.kill().await?;
                return Err(PhaseError::MonitorTimedOut {
                    phase: phase.label(),
                    seen: driver.finished_count(),
                    expected: expected.len(),
                });
            }
        }
    }
}

/// Targets the monitored run must see finish: the hosts-file lines, with
/// blanks and `#` comments skipped.
fn read_expected_targets(path: &Path) -> Result<Vec<String>, PhaseError> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read hosts file {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::SourceTag;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    /// Project with a hosts file and a stand-in scan tool. The tool drops a
    /// sentinel file when invoked, so tests can assert skip semantics.
    fn test_setup(project: &Path, hosts_name: &str, tool_body: &str) -> (Config, PipelineOptions) {
        let script = project.join("fake_tool.sh");
        fs::write(&script, tool_body).unwrap();
        let hosts = project.join(hosts_name);
        fs::write(&hosts, "10.0.0.5\n").unwrap();

        let config = Config {
            project_dir: project.to_path_buf(),
            hosts_output_dir: project.join("recon/hosts"),
            stage_dir: project.join("recon/stage_3"),
            log_dir: project.join(".reconbox/logs"),
            state_file: project.join(".reconbox/state"),
            interpreter: "/bin/sh".into(),
            tool_script: script,
            tool_config: None,
            session_name: "reconbox-test".into(),
            poll_timeout: Duration::from_millis(50),
            monitor_timeout: Duration::from_secs(5),
        };
        let opts = PipelineOptions {
            hosts_file: Some(hosts),
            ..PipelineOptions::default()
        };
        (config, opts)
    }

    fn quiet_ui() -> ReconUI {
        ReconUI::new(1, false)
    }

    const TOOL_OK: &str = "touch tool_ran.sentinel\nexit 0\n";
    const TOOL_FAILS: &str = "exit 2\n";

    #[tokio::test]
    async fn masscan_hosts_run_writes_masscan_marker() {
        let dir = tempdir().unwrap();
        let (config, opts) = test_setup(dir.path(), "masscan_output.txt", TOOL_OK);

        let pipeline = ReconPipeline::new(config.clone(), opts);
        let phases = pipeline.run(&quiet_ui()).await.unwrap();

        assert_eq!(phases.len(), 1);
        assert_eq!(phases[0].state(), PhaseState::Completed);
        assert!(config.stage_dir.join(".autorecon_masscan").exists());
        assert!(config.hosts_output_dir.exists());
    }

    #[tokio::test]
    async fn failing_tool_marks_phase_failed_and_writes_no_marker() {
        let dir = tempdir().unwrap();
        let (config, opts) = test_setup(dir.path(), "masscan_output.txt", TOOL_FAILS);

        let pipeline = ReconPipeline::new(config.clone(), opts);
        let err = pipeline.run(&quiet_ui()).await.unwrap_err();

        assert!(matches!(
            err,
            PhaseError::ToolNonZeroExit { exit_code: 2, .. }
        ));
        assert!(!config.stage_dir.join(".autorecon_masscan").exists());

        let state = StateManager::new(config.state_file.clone());
        assert_eq!(
            state.last_status("autorecon (masscan)").as_deref(),
            Some("failed")
        );
    }

    #[tokio::test]
    async fn existing_marker_skips_the_tool_entirely() {
        let dir = tempdir().unwrap();
        let (config, opts) = test_setup(dir.path(), "masscan_output.txt", TOOL_OK);
        MarkerStore::new(config.stage_dir.clone())
            .create("autorecon", SourceTag::Masscan)
            .unwrap();

        let pipeline = ReconPipeline::new(config.clone(), opts);
        let phases = pipeline.run(&quiet_ui()).await.unwrap();

        assert_eq!(phases[0].state(), PhaseState::Completed);
        assert!(
            !dir.path().join("tool_ran.sentinel").exists(),
            "skipped phase must not invoke the tool"
        );
    }

    #[tokio::test]
    async fn force_reruns_a_markered_phase() {
        let dir = tempdir().unwrap();
        let (config, mut opts) = test_setup(dir.path(), "masscan_output.txt", TOOL_OK);
        MarkerStore::new(config.stage_dir.clone())
            .create("autorecon", SourceTag::Masscan)
            .unwrap();
        opts.force = true;

        let pipeline = ReconPipeline::new(config, opts);
        pipeline.run(&quiet_ui()).await.unwrap();

        assert!(dir.path().join("tool_ran.sentinel").exists());
    }

    #[tokio::test]
    async fn leftover_hosts_get_their_own_marker() {
        let dir = tempdir().unwrap();
        let (config, opts) = test_setup(dir.path(), "leftover_hosts.txt", TOOL_OK);

        let pipeline = ReconPipeline::new(config.clone(), opts);
        pipeline.run(&quiet_ui()).await.unwrap();

        assert!(config.stage_dir.join(".autorecon_leftover").exists());
        assert!(!config.stage_dir.join(".autorecon_masscan").exists());
    }

    #[tokio::test]
    async fn targets_grouping_fails_fast() {
        let dir = tempdir().unwrap();
        let (config, mut opts) = test_setup(dir.path(), "masscan_output.txt", TOOL_OK);
        opts.targets_file = Some(dir.path().join("targets.txt"));

        let pipeline = ReconPipeline::new(config.clone(), opts);
        let err = pipeline.run(&quiet_ui()).await.unwrap_err();

        assert!(matches!(err, PhaseError::FeatureNotImplemented { .. }));
        assert!(!config.stage_dir.join(".autorecon_masscan").exists());
        assert!(!dir.path().join("tool_ran.sentinel").exists());
    }

    #[tokio::test]
    async fn scan_params_fail_fast() {
        let dir = tempdir().unwrap();
        let (config, mut opts) = test_setup(dir.path(), "masscan_output.txt", TOOL_OK);
        opts.scan_params = Some(dir.path().join("params.json"));

        let pipeline = ReconPipeline::new(config, opts);
        let err = pipeline.run(&quiet_ui()).await.unwrap_err();
        assert!(matches!(err, PhaseError::FeatureNotImplemented { .. }));
    }

    #[tokio::test]
    async fn auto_discovery_builds_one_phase_per_hosts_file() {
        let dir = tempdir().unwrap();
        let (config, mut opts) = test_setup(dir.path(), "unused.txt", TOOL_OK);
        opts.hosts_file = None;
        let recon = dir.path().join("recon");
        fs::create_dir_all(&recon).unwrap();
        fs::write(recon.join("masscan_hosts.txt"), "10.0.0.1\n").unwrap();
        fs::write(recon.join("leftover_hosts.txt"), "10.0.0.2\n").unwrap();

        let pipeline = ReconPipeline::new(config, opts);
        let phases = pipeline.assemble_phases().unwrap();

        assert_eq!(phases.len(), 2);
        let sources: HashSet<SourceTag> = phases.iter().map(|p| p.source).collect();
        assert!(sources.contains(&SourceTag::Masscan));
        assert!(sources.contains(&SourceTag::Leftover));
    }

    #[test]
    fn expected_targets_skip_blanks_and_comments() {
        let dir = tempdir().unwrap();
        let hosts = dir.path().join("hosts.txt");
        fs::write(&hosts, "10.0.0.1\n\n# decommissioned\n10.0.0.2\n").unwrap();

        let targets = read_expected_targets(&hosts).unwrap();
        assert_eq!(targets, vec!["10.0.0.1", "10.0.0.2"]);
    }
}
