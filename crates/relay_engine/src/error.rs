use std::io;

use thiserror::Error;
use tokio::task::JoinError;

/// A backend call failed or returned something unusable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectorError {
    #[error("no connector registered for platform {platform}")]
    UnknownPlatform { platform: String },
    #[error("{platform} request failed: {message}")]
    Request { platform: String, message: String },
    #[error("{platform} returned an invalid response: {message}")]
    InvalidResponse { platform: String, message: String },
    #[error("connector call aborted: {0}")]
    Aborted(String),
}

impl ConnectorError {
    pub fn request(platform: impl Into<String>, message: impl Into<String>) -> Self {
        ConnectorError::Request {
            platform: platform.into(),
            message: message.into(),
        }
    }

    pub(crate) fn from_join(err: JoinError) -> Self {
        if err.is_panic() {
            ConnectorError::Aborted("connector panicked".to_string())
        } else {
            ConnectorError::Aborted("connector task cancelled".to_string())
        }
    }
}

/// The destination rejected an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    #[error("send to {destination} failed: {message}")]
    Rejected {
        destination: String,
        message: String,
    },
    #[error("send to {destination} aborted: {message}")]
    Aborted {
        destination: String,
        message: String,
    },
}

impl SendError {
    pub fn rejected(destination: impl Into<String>, message: impl Into<String>) -> Self {
        SendError::Rejected {
            destination: destination.into(),
            message: message.into(),
        }
    }

    pub(crate) fn from_join(destination: &str, err: JoinError) -> Self {
        let message = if err.is_panic() {
            "destination panicked"
        } else {
            "send task cancelled"
        };
        SendError::Aborted {
            destination: destination.to_string(),
            message: message.to_string(),
        }
    }
}

/// A job could not be handed to the processing loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("processing loop is not running")]
    NotRunning,
    #[error("processing loop closed before the job was submitted")]
    LoopClosed,
}

/// The background loop could not be brought up.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to build runtime: {0}")]
    Runtime(#[source] io::Error),
    #[error("failed to spawn loop thread: {0}")]
    Thread(#[source] io::Error),
}
