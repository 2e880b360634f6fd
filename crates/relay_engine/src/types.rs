use std::fmt;
use std::sync::Arc;

use relay_core::{ConnectorParams, InboundMessage, JobId, JobStatus, Priority, SegmentPosition};

use crate::Destination;

/// One inbound message waiting for, or receiving, a backend reply.
pub struct MessageJob {
    pub id: JobId,
    pub destination: Arc<dyn Destination>,
    pub message: InboundMessage,
    pub params: ConnectorParams,
    pub priority: Priority,
    /// Assigned by the ingestion queue; breaks priority ties in arrival order.
    pub sequence: u64,
    pub status: JobStatus,
}

impl MessageJob {
    pub fn new(
        id: JobId,
        destination: Arc<dyn Destination>,
        message: InboundMessage,
        params: ConnectorParams,
        priority: Priority,
    ) -> Self {
        Self {
            id,
            destination,
            message,
            params,
            priority,
            sequence: 0,
            status: JobStatus::Queued,
        }
    }
}

impl fmt::Debug for MessageJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageJob")
            .field("id", &self.id)
            .field("destination", &self.destination.identity())
            .field("message", &self.message)
            .field("params", &self.params)
            .field("priority", &self.priority)
            .field("sequence", &self.sequence)
            .field("status", &self.status)
            .finish()
    }
}

/// One outbound segment, consumed exactly once by the sender.
pub struct SendJob {
    pub destination: Arc<dyn Destination>,
    pub text: String,
    pub mention: Option<String>,
    pub job_id: JobId,
    pub position: Option<SegmentPosition>,
}

impl fmt::Debug for SendJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendJob")
            .field("destination", &self.destination.identity())
            .field("text_len", &self.text.chars().count())
            .field("mention", &self.mention)
            .field("job_id", &self.job_id)
            .field("position", &self.position)
            .finish()
    }
}
