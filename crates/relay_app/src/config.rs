use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use relay_engine::{ConnectorParams, LifecycleError, ProcessorConfig};
use serde::Deserialize;
use thiserror::Error;

use crate::logging::LogDestination;

pub(crate) const CONFIG_FILENAME: &str = "relay.ron";

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to read config {path:?}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config {path:?}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("failed to start processor: {0}")]
    Lifecycle(#[from] LifecycleError),
    #[error("console I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Connector profile used for one destination identity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct Route {
    pub destination: String,
    pub params: ConnectorParams,
}

/// Contents of `relay.ron`. Every field is optional; durations are whole
/// milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub log_destination: LogDestination,
    pub max_concurrent: usize,
    pub max_log_lines: usize,
    pub chunk_size: usize,
    pub send_delay_ms: u64,
    pub error_backoff_ms: u64,
    pub idle_wait_ms: u64,
    pub capacity_poll_ms: u64,
    pub retry_count: u32,
    pub retry_pause_ms: u64,
    pub status_interval_secs: u64,
    pub fallback_reply: String,
    pub connector: ConnectorParams,
    pub routes: Vec<Route>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let processor = ProcessorConfig::default();
        Self {
            log_destination: LogDestination::default(),
            max_concurrent: processor.max_concurrent,
            max_log_lines: processor.max_log_lines,
            chunk_size: processor.chunk_size,
            send_delay_ms: millis(processor.send_delay),
            error_backoff_ms: millis(processor.error_backoff),
            idle_wait_ms: millis(processor.idle_wait),
            capacity_poll_ms: millis(processor.capacity_poll),
            retry_count: 3,
            retry_pause_ms: 1000,
            status_interval_secs: 10,
            fallback_reply: processor.fallback_reply,
            connector: ConnectorParams::default(),
            routes: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            max_concurrent: self.max_concurrent,
            max_log_lines: self.max_log_lines,
            chunk_size: self.chunk_size,
            send_delay: Duration::from_millis(self.send_delay_ms),
            error_backoff: Duration::from_millis(self.error_backoff_ms),
            idle_wait: Duration::from_millis(self.idle_wait_ms),
            capacity_poll: Duration::from_millis(self.capacity_poll_ms),
            fallback_reply: self.fallback_reply.clone(),
            ..ProcessorConfig::default()
        }
    }

    /// Profile routed to `identity`, or the default profile.
    pub fn params_for(&self, identity: &str) -> ConnectorParams {
        self.routes
            .iter()
            .find(|route| route.destination == identity)
            .map(|route| route.params.clone())
            .unwrap_or_else(|| self.connector.clone())
    }

    pub fn retry_pause(&self) -> Duration {
        Duration::from_millis(self.retry_pause_ms)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs.max(1))
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Reads the config at `path`. A missing file yields `Ok(None)` so the caller
/// can fall back to defaults once logging is up.
pub(crate) fn load(path: &Path) -> Result<Option<AppConfig>, AppError> {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(AppError::ConfigRead {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    ron::from_str(&content)
        .map(Some)
        .map_err(|source| AppError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
}
