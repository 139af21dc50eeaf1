//! Runtime configuration for reconbox.
//!
//! `Config` bridges the CLI flags and the optional JSON settings file with
//! the runtime needs of the orchestrator: project-relative directory layout,
//! the external tool's command line, and monitoring timeouts.

use std::net::{IpAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use glob::glob;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Default bounded wait for one non-blocking read of session output.
const DEFAULT_POLL_TIMEOUT_MS: u64 = 200;
/// Default deadline for a monitored enumeration run.
const DEFAULT_MONITOR_TIMEOUT_SECS: u64 = 21_600;

/// Orchestration-level settings loaded from `--config <json>`.
///
/// Everything here has a default; the file only needs the keys it wants to
/// override. Unknown keys are rejected so a typo cannot silently fall back
/// to a default.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Interpreter used to launch the scan tool (default: python3).
    pub interpreter: Option<String>,
    /// Path to the scan tool's entry script.
    pub tool_script: Option<PathBuf>,
    /// Config file forwarded to the scan tool as `--config`.
    pub tool_config: Option<PathBuf>,
    /// tmux session name for monitored runs.
    pub session_name: Option<String>,
    /// Bounded wait per non-blocking read, in milliseconds.
    pub poll_timeout_ms: Option<u64>,
    /// Deadline for a monitored run, in seconds.
    pub monitor_timeout_secs: Option<u64>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|source| ConfigError::SettingsReadFailed {
                path: path.to_path_buf(),
                source,
            })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::SettingsParseFailed {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    /// Output directory for the enumeration tool (recon/hosts).
    pub hosts_output_dir: PathBuf,
    /// Directory holding phase-completion markers (recon/stage_3).
    pub stage_dir: PathBuf,
    /// Session captures and tool logs (.reconbox/logs).
    pub log_dir: PathBuf,
    /// Phase state journal (.reconbox/state).
    pub state_file: PathBuf,
    pub interpreter: String,
    pub tool_script: PathBuf,
    pub tool_config: Option<PathBuf>,
    pub session_name: String,
    pub poll_timeout: Duration,
    pub monitor_timeout: Duration,
}

impl Config {
    /// Build a Config from the project-dir flags and optional settings file.
    ///
    /// Exactly one of `project` / `here` must select the project directory.
    pub fn new(
        project: Option<PathBuf>,
        here: bool,
        settings_file: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let raw_dir = match project {
            Some(dir) => dir,
            None if here => {
                std::env::current_dir().map_err(|source| ConfigError::ProjectDirUnresolvable {
                    path: PathBuf::from("."),
                    source,
                })?
            }
            None => return Err(ConfigError::NoProjectDir),
        };
        let project_dir =
            raw_dir
                .canonicalize()
                .map_err(|source| ConfigError::ProjectDirUnresolvable {
                    path: raw_dir.clone(),
                    source,
                })?;

        let settings = match settings_file {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };

        let reconbox_dir = project_dir.join(".reconbox");
        Ok(Self {
            hosts_output_dir: project_dir.join("recon/hosts"),
            stage_dir: project_dir.join("recon/stage_3"),
            log_dir: reconbox_dir.join("logs"),
            state_file: reconbox_dir.join("state"),
            project_dir,
            interpreter: settings.interpreter.unwrap_or_else(|| "python3".into()),
            tool_script: settings
                .tool_script
                .unwrap_or_else(|| PathBuf::from("external_tools/AutoRecon/autorecon.py")),
            tool_config: settings.tool_config,
            session_name: settings.session_name.unwrap_or_else(|| "reconbox".into()),
            poll_timeout: Duration::from_millis(
                settings.poll_timeout_ms.unwrap_or(DEFAULT_POLL_TIMEOUT_MS),
            ),
            monitor_timeout: Duration::from_secs(
                settings
                    .monitor_timeout_secs
                    .unwrap_or(DEFAULT_MONITOR_TIMEOUT_SECS),
            ),
        })
    }

    pub fn ensure_directories(&self) -> Result<(), std::io::Error> {
        std::fs::create_dir_all(&self.hosts_output_dir)?;
        std::fs::create_dir_all(&self.stage_dir)?;
        std::fs::create_dir_all(&self.log_dir)?;
        Ok(())
    }

    /// Argument vector for one enumeration run:
    /// `<tool_script> -t <hosts> -o <output-dir> -vv [--config <file>]`.
    /// The interpreter itself is the program, not part of this vector.
    pub fn tool_args(&self, hosts_file: &Path) -> Vec<String> {
        let mut args = vec![
            self.tool_script.to_string_lossy().into_owned(),
            "-t".into(),
            hosts_file.to_string_lossy().into_owned(),
            "-o".into(),
            self.hosts_output_dir.to_string_lossy().into_owned(),
            "-vv".into(),
        ];
        if let Some(ref cfg) = self.tool_config {
            args.push("--config".into());
            args.push(cfg.to_string_lossy().into_owned());
        }
        args
    }

    /// The same command as `tool_args`, as a single shell line for
    /// injection into a tmux session.
    pub fn tool_command_line(&self, hosts_file: &Path) -> String {
        let mut parts = vec![self.interpreter.clone()];
        parts.extend(self.tool_args(hosts_file));
        parts.join(" ")
    }

    /// Find hosts files under `<project>/recon/` matching `*hosts*.txt`,
    /// most recently modified first.
    pub fn find_hosts_files(&self) -> Result<Vec<PathBuf>, ConfigError> {
        let recon_dir = self.project_dir.join("recon");
        let pattern = recon_dir.join("*hosts*.txt").to_string_lossy().to_string();

        let mut files: Vec<PathBuf> = glob(&pattern)
            .ok()
            .into_iter()
            .flatten()
            .filter_map(|entry| entry.ok())
            .collect();

        if files.is_empty() {
            return Err(ConfigError::NoHostsFile { dir: recon_dir });
        }

        files.sort_by(|a, b| {
            let a_time = a.metadata().and_then(|m| m.modified()).ok();
            let b_time = b.metadata().and_then(|m| m.modified()).ok();
            b_time.cmp(&a_time)
        });

        Ok(files)
    }
}

/// Expand a `--target` value into a target list: a readable file is a
/// newline-separated list (blank lines and `#` comments skipped), anything
/// else is a single target.
pub fn parse_targets(target: &str) -> Result<Vec<String>, ConfigError> {
    let path = Path::new(target);
    if path.is_file() {
        let content =
            std::fs::read_to_string(path).map_err(|source| ConfigError::TargetListUnreadable {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_string)
            .collect())
    } else {
        Ok(vec![target.to_string()])
    }
}

/// Check that a target is an IP address or resolves via DNS.
pub fn verify_target(target: &str) -> Result<(), ConfigError> {
    if target.parse::<IpAddr>().is_ok() {
        return Ok(());
    }
    let resolves = (target, 0u16)
        .to_socket_addrs()
        .map(|mut addrs| addrs.next().is_some())
        .unwrap_or(false);
    if resolves {
        Ok(())
    } else {
        Err(ConfigError::DeadTarget {
            target: target.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn config_requires_a_project_dir() {
        let result = Config::new(None, false, None);
        assert!(matches!(result, Err(ConfigError::NoProjectDir)));
    }

    #[test]
    fn config_derives_project_layout() {
        let dir = tempdir().unwrap();
        let config = Config::new(Some(dir.path().to_path_buf()), false, None).unwrap();

        let root = dir.path().canonicalize().unwrap();
        assert_eq!(config.hosts_output_dir, root.join("recon/hosts"));
        assert_eq!(config.stage_dir, root.join("recon/stage_3"));
        assert_eq!(config.state_file, root.join(".reconbox/state"));
        assert_eq!(config.interpreter, "python3");
        assert_eq!(config.session_name, "reconbox");
    }

    #[test]
    fn ensure_directories_creates_layout() {
        let dir = tempdir().unwrap();
        let config = Config::new(Some(dir.path().to_path_buf()), false, None).unwrap();
        config.ensure_directories().unwrap();
        assert!(config.hosts_output_dir.exists());
        assert!(config.stage_dir.exists());
        assert!(config.log_dir.exists());
    }

    #[test]
    fn settings_override_defaults() {
        let dir = tempdir().unwrap();
        let settings_path = dir.path().join("settings.json");
        fs::write(
            &settings_path,
            r#"{"interpreter": "/opt/venv/bin/python", "poll_timeout_ms": 500}"#,
        )
        .unwrap();

        let config =
            Config::new(Some(dir.path().to_path_buf()), false, Some(&settings_path)).unwrap();
        assert_eq!(config.interpreter, "/opt/venv/bin/python");
        assert_eq!(config.poll_timeout, Duration::from_millis(500));
        // Untouched keys keep their defaults
        assert_eq!(config.session_name, "reconbox");
    }

    #[test]
    fn settings_reject_unknown_keys() {
        let dir = tempdir().unwrap();
        let settings_path = dir.path().join("settings.json");
        fs::write(&settings_path, r#"{"interperter": "python"}"#).unwrap();

        let result = Settings::load(&settings_path);
        assert!(matches!(
            result,
            Err(ConfigError::SettingsParseFailed { .. })
        ));
    }

    #[test]
    fn settings_missing_file_errors() {
        let result = Settings::load(Path::new("/nonexistent/settings.json"));
        assert!(matches!(result, Err(ConfigError::SettingsReadFailed { .. })));
    }

    #[test]
    fn tool_args_follow_the_subprocess_contract() {
        let dir = tempdir().unwrap();
        let config = Config::new(Some(dir.path().to_path_buf()), false, None).unwrap();
        let args = config.tool_args(Path::new("/tmp/masscan_output.txt"));

        assert!(args[0].ends_with("autorecon.py"));
        assert_eq!(args[1], "-t");
        assert_eq!(args[2], "/tmp/masscan_output.txt");
        assert_eq!(args[3], "-o");
        assert_eq!(args[5], "-vv");
        assert!(!args.contains(&"--config".to_string()));
    }

    #[test]
    fn tool_args_append_config_when_set() {
        let dir = tempdir().unwrap();
        let settings_path = dir.path().join("settings.json");
        fs::write(&settings_path, r#"{"tool_config": "/etc/recon.toml"}"#).unwrap();

        let config =
            Config::new(Some(dir.path().to_path_buf()), false, Some(&settings_path)).unwrap();
        let args = config.tool_args(Path::new("/tmp/hosts.txt"));
        let idx = args.iter().position(|a| a == "--config").unwrap();
        assert_eq!(args[idx + 1], "/etc/recon.toml");
    }

    #[test]
    fn find_hosts_files_prefers_most_recent() {
        let dir = tempdir().unwrap();
        let recon = dir.path().join("recon");
        fs::create_dir_all(&recon).unwrap();
        let older = recon.join("masscan_hosts.txt");
        let newer = recon.join("leftover_hosts.txt");
        fs::write(&older, "10.0.0.1\n").unwrap();
        fs::write(&newer, "10.0.0.2\n").unwrap();
        // Push the second file's mtime clearly past the first
        let later = std::time::SystemTime::now() + Duration::from_secs(60);
        let f = fs::File::options().write(true).open(&newer).unwrap();
        f.set_modified(later).unwrap();

        let config = Config::new(Some(dir.path().to_path_buf()), false, None).unwrap();
        let files = config.find_hosts_files().unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("leftover_hosts.txt"));
    }

    #[test]
    fn find_hosts_files_errors_when_none_exist() {
        let dir = tempdir().unwrap();
        let config = Config::new(Some(dir.path().to_path_buf()), false, None).unwrap();
        assert!(matches!(
            config.find_hosts_files(),
            Err(ConfigError::NoHostsFile { .. })
        ));
    }

    #[test]
    fn parse_targets_single_value() {
        let targets = parse_targets("10.0.0.5").unwrap();
        assert_eq!(targets, vec!["10.0.0.5"]);
    }

    #[test]
    fn parse_targets_file_skips_blanks_and_comments() {
        let dir = tempdir().unwrap();
        let list = dir.path().join("targets.txt");
        fs::write(&list, "10.0.0.1\n\n# staging\n10.0.0.2\n").unwrap();

        let targets = parse_targets(list.to_str().unwrap()).unwrap();
        assert_eq!(targets, vec!["10.0.0.1", "10.0.0.2"]);
    }

    #[test]
    fn verify_target_accepts_ip_literals() {
        verify_target("192.168.1.1").unwrap();
        verify_target("::1").unwrap();
    }

    #[test]
    fn verify_target_rejects_unresolvable_name() {
        let result = verify_target("host.reconbox.invalid");
        assert!(matches!(result, Err(ConfigError::DeadTarget { .. })));
    }
}
