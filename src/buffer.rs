//! Shared append-only log of captured process output.

use chrono::{DateTime, Local};
use std::sync::Mutex;

/// A single captured line with its arrival timestamp.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub text: String,
}

impl LogEntry {
    fn now(text: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            text: text.into(),
        }
    }
}

/// The three independently-ordered buffer sequences.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sequence {
    Stdout,
    Stderr,
    /// Status transitions ("Started"/"Ended") rather than captured output.
    Lifecycle,
}

/// Append-only record of captured lines, shared between a supervisor and its
/// two stream readers.
///
/// Each sequence is guarded on its own, so concurrent appends never lose
/// entries. Ordering holds within a sequence, never across sequences.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    stdout: Mutex<Vec<LogEntry>>,
    stderr: Mutex<Vec<LogEntry>>,
    lifecycle: Mutex<Vec<LogEntry>>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, seq: Sequence, text: impl Into<String>) {
        let entry = LogEntry::now(text);
        self.lane(seq).lock().unwrap().push(entry);
    }

    /// Cloned view of one sequence; consumers tolerate concurrent growth.
    pub fn snapshot(&self, seq: Sequence) -> Vec<LogEntry> {
        self.lane(seq).lock().unwrap().clone()
    }

    pub fn len(&self, seq: Sequence) -> usize {
        self.lane(seq).lock().unwrap().len()
    }

    fn lane(&self, seq: Sequence) -> &Mutex<Vec<LogEntry>> {
        match seq {
            Sequence::Stdout => &self.stdout,
            Sequence::Stderr => &self.stderr,
            Sequence::Lifecycle => &self.lifecycle,
        }
    }
}
