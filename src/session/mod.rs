//! Persistent interactive sessions for long-running scan tools.
//!
//! A session is a named, long-lived terminal (tmux in production) that
//! outlives any single poll. The driver owns exactly one session plus the
//! parser state scoped to it, and communicates purely through key
//! injection and bounded non-blocking reads — there is no blocking wait on
//! the external tool anywhere in the monitoring path.

pub mod parser;
pub mod tmux;

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::errors::SessionError;
use parser::OutputParser;

pub use tmux::TmuxBackend;

/// Result of one bounded non-blocking read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadChunk {
    /// New output arrived.
    Data(String),
    /// Nothing new within the bounded wait; the session is still alive.
    Timeout,
    /// The session has terminated; no more data will ever arrive.
    Eof,
}

/// Narrow interface over the session subsystem.
///
/// The production implementation shells out to tmux; tests swap in a
/// scripted in-memory fake so the monitoring logic never spawns a real
/// terminal.
#[async_trait]
pub trait SessionBackend: Send {
    fn name(&self) -> &str;

    async fn exists(&self) -> Result<bool, SessionError>;

    /// Create the session, detached.
    async fn create(&self) -> Result<(), SessionError>;

    /// Bind the output capture so `read_chunk` starts seeing data.
    async fn attach(&mut self) -> Result<(), SessionError>;

    /// Inject a literal command line followed by an enter keystroke.
    async fn send_line(&self, text: &str) -> Result<(), SessionError>;

    /// Inject one interrupt (Ctrl-C equivalent).
    async fn send_interrupt(&self) -> Result<(), SessionError>;

    /// Non-blocking read with a bounded wait.
    async fn read_chunk(&mut self, timeout: Duration) -> Result<ReadChunk, SessionError>;

    /// Hand the local terminal to the user until they detach.
    async fn interactive(&mut self) -> Result<(), SessionError>;
}

/// Owns one persistent session and the parser state scoped to it.
pub struct SessionDriver {
    backend: Box<dyn SessionBackend>,
    parser: OutputParser,
}

impl SessionDriver {
    pub fn new(backend: Box<dyn SessionBackend>) -> Self {
        Self {
            backend,
            parser: OutputParser::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.backend.name()
    }

    /// Ensure the session exists, then attach to it. Idempotent: repeated
    /// calls against the same name reattach rather than duplicate.
    ///
    /// A failed existence probe is treated as "absent" — creating a
    /// possibly-duplicate session beats crashing mid-engagement.
    pub async fn open(&mut self) -> Result<(), SessionError> {
        let exists = match self.backend.exists().await {
            Ok(exists) => exists,
            Err(err) => {
                warn!(session = self.name(), %err, "session probe failed; attempting create");
                false
            }
        };
        if !exists {
            self.backend.create().await?;
        }
        self.backend.attach().await
    }

    /// Inject a command line as if typed by a user. No acknowledgement:
    /// effects are observed through the output stream.
    pub async fn send_line(&self, text: &str) -> Result<(), SessionError> {
        debug!(session = self.backend.name(), text, "send line");
        self.backend.send_line(text).await
    }

    /// Inject `count` interrupts in sequence, stopping the foreground
    /// command without killing the session itself.
    pub async fn send_interrupt(&self, count: u32) -> Result<(), SessionError> {
        for _ in 0..count {
            self.backend.send_interrupt().await?;
        }
        Ok(())
    }

    /// Standard "abort running tool" sequence.
    pub async fn kill(&self) -> Result<(), SessionError> {
        self.send_interrupt(3).await
    }

    /// Hand terminal control to the user, bypassing automated monitoring.
    pub async fn interactive(&mut self) -> Result<(), SessionError> {
        self.backend.interactive().await
    }

    /// Drain currently-available output into complete lines.
    ///
    /// Reads until a bounded wait elapses with no new data, or the stream
    /// ends (which flushes the partial buffer as a final line). A call with
    /// nothing new returns an empty vec rather than blocking.
    pub async fn read_lines(&mut self, timeout: Duration) -> Result<Vec<String>, SessionError> {
        let mut lines = Vec::new();
        loop {
            match self.backend.read_chunk(timeout).await? {
                ReadChunk::Data(chunk) => lines.extend(self.parser.push_chunk(&chunk)),
                ReadChunk::Timeout => break,
                ReadChunk::Eof => {
                    lines.extend(self.parser.flush_partial());
                    break;
                }
            }
        }
        for line in &lines {
            if self.parser.first_noteworthy(line) {
                debug!(session = self.backend.name(), line, "session output");
            }
        }
        Ok(lines)
    }

    /// Poll for targets that finished since the last call. Each target is
    /// reported exactly once for the session's lifetime, however often its
    /// completion line reappears in the stream.
    pub async fn check_finished_scans(
        &mut self,
        timeout: Duration,
    ) -> Result<Vec<String>, SessionError> {
        let lines = self.read_lines(timeout).await?;
        Ok(lines
            .iter()
            .filter_map(|line| self.parser.note_finished_target(line))
            .collect())
    }

    pub fn finished_count(&self) -> usize {
        self.parser.seen_target_count()
    }
}
