//! Synchronous invocation of the external enumeration tool.
//!
//! This is the blocking style of phase execution: the tool runs as a child
//! process and the phase holds until it exits, because downstream phases
//! consume its fully-materialized artifacts. Output is streamed line by
//! line into a per-phase log as it arrives, and completion lines are tallied
//! on the way through.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::info;

use crate::config::Config;
use crate::errors::PhaseError;
use crate::phase::Phase;
use crate::session::parser::OutputParser;
use crate::ui::ReconUI;

pub struct ToolRunner {
    config: Config,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub exit_code: i32,
    pub log_file: PathBuf,
    /// Targets whose completion lines appeared in the tool's own output.
    pub finished_targets: Vec<String>,
}

impl ToolRunner {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run one enumeration phase to completion. A non-zero exit is the
    /// phase's failure; there is no retry.
    pub async fn run_blocking(
        &self,
        phase: &Phase,
        ui: Option<&ReconUI>,
    ) -> Result<RunOutcome, PhaseError> {
        let log_file = self
            .config
            .log_dir
            .join(format!("{}-{}.log", phase.name, phase.source));
        tokio::fs::create_dir_all(&self.config.log_dir)
            .await
            .map_err(|source| PhaseError::SpawnFailed {
                phase: phase.label(),
                source,
            })?;

        let args = self.config.tool_args(&phase.hosts_file);
        let cmd_display = format!("{} {}", self.config.interpreter, args.join(" "));
        info!(phase = phase.label(), command = cmd_display, "spawning scan tool");
        if let Some(ui) = ui {
            ui.log_step(&format!("spawning: {}", cmd_display));
        }

        let start = Instant::now();
        let mut child = Command::new(&self.config.interpreter)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .current_dir(&self.config.project_dir)
            .spawn()
            .map_err(|source| PhaseError::SpawnFailed {
                phase: phase.label(),
                source,
            })?;

        let io_err = |source| PhaseError::SpawnFailed {
            phase: phase.label(),
            source,
        };

        let mut log = tokio::fs::File::create(&log_file).await.map_err(io_err)?;

        // Drain stderr concurrently so a chatty tool cannot deadlock on a
        // full pipe while we sit on stdout.
        let stderr = child.stderr.take();
        let stderr_task = tokio::spawn(async move {
            let mut lines = Vec::new();
            if let Some(stderr) = stderr {
                let mut reader = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    lines.push(line);
                }
            }
            lines
        });

        let stdout = child.stdout.take().ok_or_else(|| {
            io_err(std::io::Error::other("child stdout was not captured"))
        })?;
        let mut reader = BufReader::new(stdout).lines();
        let mut parser = OutputParser::new();
        let mut finished_targets = Vec::new();

        while let Some(line) = reader.next_line().await.map_err(io_err)? {
            log.write_all(line.as_bytes()).await.map_err(io_err)?;
            log.write_all(b"\n").await.map_err(io_err)?;

            if let Some(target) = parser.note_finished_target(&line) {
                info!(phase = phase.label(), target, "target finished");
                if let Some(ui) = ui {
                    ui.log_step(&format!("finished {}", target));
                }
                finished_targets.push(target);
            }
        }

        let status = child.wait().await.map_err(io_err)?;
        let exit_code = status.code().unwrap_or(-1);

        if let Ok(stderr_lines) = stderr_task.await
            && !stderr_lines.is_empty()
        {
            log.write_all(b"--- stderr ---\n").await.map_err(io_err)?;
            for line in &stderr_lines {
                log.write_all(line.as_bytes()).await.map_err(io_err)?;
                log.write_all(b"\n").await.map_err(io_err)?;
            }
        }

        let duration = start.elapsed();
        info!(
            phase = phase.label(),
            exit_code,
            secs = duration.as_secs(),
            "scan tool exited"
        );
        if let Some(ui) = ui {
            ui.log_step(&format!(
                "tool exited {} after {:.1}s",
                exit_code,
                duration.as_secs_f64()
            ));
        }

        if !status.success() {
            return Err(PhaseError::ToolNonZeroExit {
                phase: phase.label(),
                exit_code,
            });
        }

        Ok(RunOutcome {
            exit_code,
            log_file,
            finished_targets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::tempdir;

    /// Config pointed at a shell script standing in for the scan tool.
    fn fake_tool_config(project: &Path, script_body: &str) -> Config {
        let script = project.join("fake_tool.sh");
        fs::write(&script, script_body).unwrap();

        Config {
            project_dir: project.to_path_buf(),
            hosts_output_dir: project.join("recon/hosts"),
            stage_dir: project.join("recon/stage_3"),
            log_dir: project.join(".reconbox/logs"),
            state_file: project.join(".reconbox/state"),
            interpreter: "/bin/sh".into(),
            tool_script: script,
            tool_config: None,
            session_name: "reconbox".into(),
            poll_timeout: Duration::from_millis(50),
            monitor_timeout: Duration::from_secs(5),
        }
    }

    fn hosts_phase(project: &Path) -> Phase {
        let hosts = project.join("masscan_output.txt");
        fs::write(&hosts, "10.0.0.5\n").unwrap();
        Phase::new("autorecon", hosts, project.join("recon/hosts"))
    }

    #[tokio::test]
    async fn successful_run_reports_finished_targets_and_logs() {
        let dir = tempdir().unwrap();
        let config = fake_tool_config(
            dir.path(),
            "echo 'Finished scanning target 10.0.0.5 in 2s'\nexit 0\n",
        );
        let phase = hosts_phase(dir.path());

        let runner = ToolRunner::new(config);
        let outcome = runner.run_blocking(&phase, None).await.unwrap();

        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.finished_targets, vec!["10.0.0.5"]);
        let log = fs::read_to_string(&outcome.log_file).unwrap();
        assert!(log.contains("Finished scanning target 10.0.0.5"));
    }

    #[tokio::test]
    async fn non_zero_exit_is_a_phase_failure() {
        let dir = tempdir().unwrap();
        let config = fake_tool_config(dir.path(), "exit 2\n");
        let phase = hosts_phase(dir.path());

        let runner = ToolRunner::new(config);
        let err = runner.run_blocking(&phase, None).await.unwrap_err();
        match err {
            PhaseError::ToolNonZeroExit { exit_code, .. } => assert_eq!(exit_code, 2),
            other => panic!("expected ToolNonZeroExit, got {other}"),
        }
    }

    #[tokio::test]
    async fn stderr_is_appended_to_the_log() {
        let dir = tempdir().unwrap();
        let config = fake_tool_config(dir.path(), "echo out\necho oops >&2\nexit 0\n");
        let phase = hosts_phase(dir.path());

        let runner = ToolRunner::new(config);
        let outcome = runner.run_blocking(&phase, None).await.unwrap();
        let log = fs::read_to_string(&outcome.log_file).unwrap();
        assert!(log.contains("out"));
        assert!(log.contains("oops"));
    }

    #[tokio::test]
    async fn missing_interpreter_is_spawn_failure() {
        let dir = tempdir().unwrap();
        let mut config = fake_tool_config(dir.path(), "exit 0\n");
        config.interpreter = "/nonexistent/interpreter".into();
        let phase = hosts_phase(dir.path());

        let runner = ToolRunner::new(config);
        let err = runner.run_blocking(&phase, None).await.unwrap_err();
        assert!(matches!(err, PhaseError::SpawnFailed { .. }));
    }
}
