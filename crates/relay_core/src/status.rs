use std::fmt;

/// Point-in-time snapshot of the processor, cheap to take from any thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessorStatus {
    pub running: bool,
    pub queue_depth: usize,
    pub in_flight: usize,
    pub max_concurrent: usize,
    pub log_count: usize,
    pub max_log_count: usize,
}

impl ProcessorStatus {
    /// Nothing queued and nothing being processed.
    pub fn is_idle(&self) -> bool {
        self.queue_depth == 0 && self.in_flight == 0
    }
}

impl fmt::Display for ProcessorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.running {
            return f.write_str("stopped");
        }
        write!(
            f,
            "running | queue: {} | processing: {}/{} | logs: {}/{}",
            self.queue_depth,
            self.in_flight,
            self.max_concurrent,
            self.log_count,
            self.max_log_count
        )
    }
}
