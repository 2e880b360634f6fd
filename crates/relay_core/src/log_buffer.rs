use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};
use log::Level;

use crate::JobId;

/// One operational log line. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: Level,
    pub job_id: Option<JobId>,
    pub text: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}][{}]",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.level
        )?;
        if let Some(job_id) = &self.job_id {
            write!(f, "[{job_id}]")?;
        }
        write!(f, " {}", self.text)
    }
}

/// Fixed-capacity ring of log entries shared between the processing loop and
/// arbitrary caller threads. The oldest entry is evicted on overflow, so
/// `len() <= capacity()` always holds.
#[derive(Debug)]
pub struct LogBuffer {
    capacity: usize,
    entries: Mutex<VecDeque<LogEntry>>,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn push(&self, level: Level, job_id: Option<&JobId>, text: impl Into<String>) {
        let entry = LogEntry {
            timestamp: Local::now(),
            level,
            job_id: job_id.cloned(),
            text: text.into(),
        };
        self.push_entry(entry);
    }

    pub fn push_entry(&self, entry: LogEntry) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// The last `lines` entries, or all of them, oldest first.
    pub fn entries(&self, lines: Option<usize>) -> Vec<LogEntry> {
        let entries = self.lock();
        let skip = match lines {
            Some(lines) => entries.len().saturating_sub(lines),
            None => 0,
        };
        entries.iter().skip(skip).cloned().collect()
    }

    /// Same as [`LogBuffer::entries`], rendered as display lines.
    pub fn lines(&self, lines: Option<usize>) -> Vec<String> {
        self.entries(lines)
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    // A panic while holding the lock cannot leave the deque half-updated.
    fn lock(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
