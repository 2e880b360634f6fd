//! Relay engine: background dispatch loop, worker pool and serialized sender.
mod capability;
mod config;
mod connectors;
mod dispatch;
mod error;
mod inflight;
mod journal;
mod processor;
mod queue;
mod sender;
mod types;

pub use capability::{Connector, Destination};
pub use config::{
    current_thread_runtime, Clock, ProcessorConfig, RuntimeFactory, DEFAULT_FALLBACK_REPLY,
};
pub use connectors::{ConnectorRegistry, EchoConnector, RetryingConnector};
pub use error::{ConnectorError, LifecycleError, SendError, SubmissionError};
pub use processor::{Processor, Submission};
pub use types::{MessageJob, SendJob};

pub use relay_core::{
    ConnectorParams, InboundMessage, JobId, JobStatus, LogEntry, Priority, ProcessorStatus,
    SegmentPosition,
};
