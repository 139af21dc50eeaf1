//! Incremental parsing of raw session output.
//!
//! The tmux capture arrives as arbitrarily-chunked text. `OutputParser`
//! reassembles complete lines across chunk boundaries, extracts per-target
//! completion events, and deduplicates both the targets it reports and the
//! triage lines it logs. All of its state is per-session: two drivers with
//! separate parsers never share a seen-set.

use std::collections::HashSet;

/// Literal phrase the enumeration tool prints when one target finishes.
pub const FINISHED_MARKER: &str = "Finished scanning target";

/// Keywords that make a line worth surfacing in debug logs.
const TRIAGE_KEYWORDS: [&str; 3] = ["finished", "scanning", "target"];

/// Extract the target identifier from a completion line: the substring
/// between the finished marker and the next occurrence of `in`, trimmed.
///
/// A line carrying the marker but no following `in` delimiter is malformed
/// output, not an error: extraction is skipped and `None` is returned.
pub fn extract_finished_target(line: &str) -> Option<String> {
    let (_, rest) = line.split_once(FINISHED_MARKER)?;
    let (target, _) = rest.split_once("in")?;
    let target = target.trim();
    if target.is_empty() {
        None
    } else {
        Some(target.to_string())
    }
}

/// Whether a line contains any triage keyword, case-insensitively.
pub fn is_noteworthy(line: &str) -> bool {
    let lowered = line.to_lowercase();
    TRIAGE_KEYWORDS.iter().any(|kw| lowered.contains(kw))
}

/// Per-session incremental line assembler and event deduplicator.
#[derive(Debug, Default)]
pub struct OutputParser {
    /// Tail of the stream that has not yet seen a newline.
    partial: String,
    /// Targets already reported for this session.
    seen_targets: HashSet<String>,
    /// Triage lines already logged for this session.
    logged_lines: HashSet<String>,
}

impl OutputParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and split off every complete line. Trailing carriage
    /// returns are stripped; the unterminated tail stays buffered for the
    /// next chunk.
    pub fn push_chunk(&mut self, chunk: &str) -> Vec<String> {
        self.partial.push_str(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.partial.find('\n') {
            let rest = self.partial.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.partial, rest);
            line.pop(); // the '\n'
            if line.ends_with('\r') {
                line.pop();
            }
            lines.push(line);
        }
        lines
    }

    /// Flush the buffered partial content as a final line. Called at
    /// end-of-stream, where an unterminated tail is all the data there will
    /// ever be.
    pub fn flush_partial(&mut self) -> Option<String> {
        if self.partial.is_empty() {
            return None;
        }
        let mut line = std::mem::take(&mut self.partial);
        if line.ends_with('\r') {
            line.pop();
        }
        Some(line)
    }

    /// Report the target finished on this line, if it is one we have not
    /// seen before. The seen-set persists for the parser's lifetime, so a
    /// completion line replayed by the terminal is reported exactly once.
    pub fn note_finished_target(&mut self, line: &str) -> Option<String> {
        let target = extract_finished_target(line)?;
        if self.seen_targets.insert(target.clone()) {
            Some(target)
        } else {
            None
        }
    }

    /// True the first time a noteworthy line is seen, false ever after.
    /// Keyed by exact line content.
    pub fn first_noteworthy(&mut self, line: &str) -> bool {
        is_noteworthy(line) && self.logged_lines.insert(line.to_string())
    }

    pub fn seen_target_count(&self) -> usize {
        self.seen_targets.len()
    }

    pub fn has_seen_target(&self, target: &str) -> bool {
        self.seen_targets.contains(target)
    }
}
