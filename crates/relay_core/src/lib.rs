//! Relay core: message-job data model, reply segmentation and the bounded
//! operational log. Nothing in here touches threads or IO.
mod job;
mod log_buffer;
mod segment;
mod status;

pub use job::{content_preview, ConnectorParams, InboundMessage, JobId, JobStatus, Priority};
pub use log_buffer::{LogBuffer, LogEntry};
pub use segment::{split_reply, Segment, SegmentPosition, DEFAULT_CHUNK_SIZE};
pub use status::ProcessorStatus;
