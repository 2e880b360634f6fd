use log::Level;
use relay_core::{JobId, LogBuffer, LogEntry};
use relay_logging::{relay_debug, relay_error, relay_info, relay_warn};

/// Operational log: every line goes to the bounded in-memory ring that the
/// status surface reads, and is mirrored to the `log` facade.
#[derive(Debug)]
pub(crate) struct Journal {
    buffer: LogBuffer,
}

impl Journal {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: LogBuffer::new(capacity),
        }
    }

    pub fn record(&self, level: Level, job_id: Option<&JobId>, text: String) {
        match (level, job_id) {
            (Level::Error, Some(id)) => relay_error!(job: id, "{}", text),
            (Level::Error, None) => relay_error!("{}", text),
            (Level::Warn, Some(id)) => relay_warn!(job: id, "{}", text),
            (Level::Warn, None) => relay_warn!("{}", text),
            (Level::Info, Some(id)) => relay_info!(job: id, "{}", text),
            (Level::Info, None) => relay_info!("{}", text),
            (_, Some(id)) => relay_debug!(job: id, "{}", text),
            (_, None) => relay_debug!("{}", text),
        }
        self.buffer.push(level, job_id, text);
    }

    pub fn info(&self, job_id: Option<&JobId>, text: impl Into<String>) {
        self.record(Level::Info, job_id, text.into());
    }

    pub fn warn(&self, job_id: Option<&JobId>, text: impl Into<String>) {
        self.record(Level::Warn, job_id, text.into());
    }

    pub fn error(&self, job_id: Option<&JobId>, text: impl Into<String>) {
        self.record(Level::Error, job_id, text.into());
    }

    pub fn lines(&self, lines: Option<usize>) -> Vec<String> {
        self.buffer.lines(lines)
    }

    pub fn entries(&self, lines: Option<usize>) -> Vec<LogEntry> {
        self.buffer.entries(lines)
    }

    pub fn clear(&self) {
        self.buffer.clear();
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }
}
