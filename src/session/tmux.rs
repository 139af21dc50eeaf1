//! tmux implementation of the session backend.
//!
//! The session lives in the tmux server, outside this process. Commands go
//! in through `send-keys`; output comes back through a `pipe-pane` capture
//! file that is read incrementally with an offset carried by the open file
//! handle. tmux only allows one pipe per pane (`-o`), so re-attaching to a
//! live session reuses the existing capture.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::process::Command;
use tokio::time::Instant;
use tracing::debug;

use super::{ReadChunk, SessionBackend};
use crate::errors::SessionError;

/// Sleep between capture-file polls while waiting out a read timeout.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

const READ_BUF_SIZE: usize = 4096;

pub struct TmuxBackend {
    name: String,
    capture_path: PathBuf,
    capture: Option<File>,
}

impl TmuxBackend {
    /// A backend for the named session, capturing output under
    /// `<capture_dir>/session-<name>.log`.
    pub fn new(name: &str, capture_dir: &Path) -> Self {
        Self {
            name: name.to_string(),
            capture_path: capture_dir.join(format!("session-{name}.log")),
            capture: None,
        }
    }

    pub fn capture_path(&self) -> &Path {
        &self.capture_path
    }

    /// Run a tmux subcommand with stdio discarded, returning its status.
    async fn tmux(&self, args: &[&str]) -> std::io::Result<std::process::ExitStatus> {
        debug!(session = self.name, ?args, "tmux");
        Command::new("tmux")
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
    }
}

#[async_trait]
impl SessionBackend for TmuxBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self) -> Result<bool, SessionError> {
        let status = self
            .tmux(&["has-session", "-t", &self.name])
            .await
            .map_err(|source| SessionError::ProbeFailed {
                name: self.name.clone(),
                source,
            })?;
        Ok(status.success())
    }

    async fn create(&self) -> Result<(), SessionError> {
        let status = self
            .tmux(&["new-session", "-d", "-s", &self.name])
            .await
            .map_err(|source| SessionError::CreateFailed {
                name: self.name.clone(),
                source,
            })?;
        if !status.success() {
            return Err(SessionError::CreateRejected {
                name: self.name.clone(),
                exit_code: status.code().unwrap_or(-1),
            });
        }
        Ok(())
    }

    async fn attach(&mut self) -> Result<(), SessionError> {
        let attach_err = |source| SessionError::AttachFailed {
            name: self.name.clone(),
            source,
        };

        if let Some(parent) = self.capture_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(attach_err)?;
        }

        // -o: only open a new pipe if none exists, so reattach is a no-op
        let pipe_cmd = format!("cat >> '{}'", self.capture_path.display());
        let status = self
            .tmux(&["pipe-pane", "-t", &self.name, "-o", &pipe_cmd])
            .await
            .map_err(attach_err)?;
        if !status.success() {
            return Err(SessionError::AttachFailed {
                name: self.name.clone(),
                source: std::io::Error::other(format!(
                    "tmux pipe-pane exited {}",
                    status.code().unwrap_or(-1)
                )),
            });
        }

        let mut file = tokio::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.capture_path)
            .await
            .map_err(attach_err)?;
        // Skip scrollback from earlier runs; monitoring starts from now
        file.seek(std::io::SeekFrom::End(0))
            .await
            .map_err(attach_err)?;
        self.capture = Some(file);
        Ok(())
    }

    async fn send_line(&self, text: &str) -> Result<(), SessionError> {
        let status = self
            .tmux(&["send-keys", "-t", &self.name, text, "C-m"])
            .await
            .map_err(|source| SessionError::SendFailed {
                name: self.name.clone(),
                source,
            })?;
        if !status.success() {
            return Err(SessionError::SendFailed {
                name: self.name.clone(),
                source: std::io::Error::other(format!(
                    "tmux send-keys exited {}",
                    status.code().unwrap_or(-1)
                )),
            });
        }
        Ok(())
    }

    async fn send_interrupt(&self) -> Result<(), SessionError> {
        let status = self
            .tmux(&["send-keys", "-t", &self.name, "C-c"])
            .await
            .map_err(|source| SessionError::SendFailed {
                name: self.name.clone(),
                source,
            })?;
        if !status.success() {
            return Err(SessionError::SendFailed {
                name: self.name.clone(),
                source: std::io::Error::other(format!(
                    "tmux send-keys exited {}",
                    status.code().unwrap_or(-1)
                )),
            });
        }
        Ok(())
    }

    async fn read_chunk(&mut self, timeout: Duration) -> Result<ReadChunk, SessionError> {
        let deadline = Instant::now() + timeout;
        let mut buf = vec![0u8; READ_BUF_SIZE];
        loop {
            let n = {
                let file =
                    self.capture
                        .as_mut()
                        .ok_or_else(|| SessionError::NotAttached {
                            name: self.name.clone(),
                        })?;
                file.read(&mut buf)
                    .await
                    .map_err(|source| SessionError::CaptureIo {
                        path: self.capture_path.clone(),
                        source,
                    })?
            };
            if n > 0 {
                return Ok(ReadChunk::Data(
                    String::from_utf8_lossy(&buf[..n]).into_owned(),
                ));
            }
            if Instant::now() >= deadline {
                // File EOF means "nothing new yet" while the session lives;
                // only a confirmed-dead session is a true end-of-stream. A
                // failed probe counts as alive.
                let alive = self.exists().await.unwrap_or(true);
                return Ok(if alive {
                    ReadChunk::Timeout
                } else {
                    ReadChunk::Eof
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn interactive(&mut self) -> Result<(), SessionError> {
        // Inherit stdio so the user's terminal becomes the session's
        let status = Command::new("tmux")
            .args(["attach-session", "-t", &self.name])
            .status()
            .await
            .map_err(|source| SessionError::AttachFailed {
                name: self.name.clone(),
                source,
            })?;
        if !status.success() {
            return Err(SessionError::AttachFailed {
                name: self.name.clone(),
                source: std::io::Error::other(format!(
                    "tmux attach-session exited {}",
                    status.code().unwrap_or(-1)
                )),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_path_is_scoped_to_session_name() {
        let backend = TmuxBackend::new("reconbox", Path::new("/tmp/logs"));
        assert_eq!(
            backend.capture_path(),
            Path::new("/tmp/logs/session-reconbox.log")
        );
    }

    #[tokio::test]
    async fn read_chunk_requires_attach() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = TmuxBackend::new("reconbox", dir.path());
        let result = backend.read_chunk(Duration::from_millis(10)).await;
        assert!(matches!(result, Err(SessionError::NotAttached { .. })));
    }
}
