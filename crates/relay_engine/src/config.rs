use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use relay_core::DEFAULT_CHUNK_SIZE;
use tokio::runtime::Runtime;

/// Source of millisecond timestamps for job ids.
pub type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Builds the runtime that one run of the background loop drives.
pub type RuntimeFactory = Arc<dyn Fn() -> io::Result<Runtime> + Send + Sync>;

/// Default [`RuntimeFactory`]: a single-threaded runtime with IO and timers.
pub fn current_thread_runtime() -> io::Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

/// Sent in place of a reply when the connector fails.
pub const DEFAULT_FALLBACK_REPLY: &str =
    "Sorry, something went wrong while processing your message. Please try again later.";

#[derive(Clone)]
pub struct ProcessorConfig {
    /// Jobs processed at the same time. Values below 1 are treated as 1.
    pub max_concurrent: usize,
    /// Capacity of the in-memory operational log.
    pub max_log_lines: usize,
    /// Maximum characters per outbound segment.
    pub chunk_size: usize,
    /// Pause after every successful send, still holding the send lock.
    pub send_delay: Duration,
    /// Pause after a failed send before the next one.
    pub error_backoff: Duration,
    /// Longest a driver waits on an empty queue before rechecking for stop.
    pub idle_wait: Duration,
    /// Recheck interval while every worker slot is taken.
    pub capacity_poll: Duration,
    /// Pause before restarting a driver task that panicked.
    pub driver_backoff: Duration,
    pub fallback_reply: String,
    pub clock: Clock,
    pub runtime: RuntimeFactory,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            max_log_lines: 200,
            chunk_size: DEFAULT_CHUNK_SIZE,
            send_delay: Duration::from_millis(500),
            error_backoff: Duration::from_secs(1),
            idle_wait: Duration::from_secs(1),
            capacity_poll: Duration::from_millis(100),
            driver_backoff: Duration::from_secs(1),
            fallback_reply: DEFAULT_FALLBACK_REPLY.to_string(),
            clock: Arc::new(|| chrono::Utc::now().timestamp_millis().max(0) as u64),
            runtime: Arc::new(current_thread_runtime),
        }
    }
}

impl fmt::Debug for ProcessorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorConfig")
            .field("max_concurrent", &self.max_concurrent)
            .field("max_log_lines", &self.max_log_lines)
            .field("chunk_size", &self.chunk_size)
            .field("send_delay", &self.send_delay)
            .field("error_backoff", &self.error_backoff)
            .field("idle_wait", &self.idle_wait)
            .field("capacity_poll", &self.capacity_poll)
            .field("driver_backoff", &self.driver_backoff)
            .field("fallback_reply", &self.fallback_reply)
            .finish_non_exhaustive()
    }
}
