use std::fmt;

use serde::Deserialize;

/// Lower values dequeue first.
pub type Priority = i32;

/// Characters of inbound content echoed into log lines.
const PREVIEW_CHARS: usize = 50;

/// Identifier of one message job: destination identity plus the millisecond
/// timestamp at which it was submitted.
///
/// Two submissions for the same destination inside the same millisecond get
/// the same id, which is what the bridge uses to suppress duplicates. This is
/// a heuristic, not an idempotency key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(String);

impl JobId {
    pub fn new(destination: &str, millis: u64) -> Self {
        Self(format!("{destination}_{millis}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Queued,
    Processing,
    Completed,
    Error,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// An inbound chat message as seen by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InboundMessage {
    pub content: String,
    /// Who wrote it; replies mention this identity when present.
    pub sender: Option<String>,
}

impl InboundMessage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sender: None,
        }
    }

    pub fn from_sender(content: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            sender: Some(sender.into()),
        }
    }

    pub fn preview(&self) -> String {
        content_preview(&self.content)
    }
}

/// Backend selection and credentials handed to a connector for one call.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectorParams {
    /// Profile name shown in logs.
    pub name: String,
    /// Backend family, matched case-insensitively by the connector registry.
    pub platform: String,
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub system_prompt: String,
}

impl Default for ConnectorParams {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            platform: "openai".to_string(),
            api_key: String::new(),
            base_url: String::new(),
            model: "gpt-3.5-turbo".to_string(),
            system_prompt: "You are a helpful assistant.".to_string(),
        }
    }
}

impl ConnectorParams {
    pub fn for_platform(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            ..Self::default()
        }
    }
}

impl fmt::Debug for ConnectorParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = if self.api_key.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };
        f.debug_struct("ConnectorParams")
            .field("name", &self.name)
            .field("platform", &self.platform)
            .field("api_key", &key)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("system_prompt_len", &self.system_prompt.chars().count())
            .finish()
    }
}

/// First characters of `content`, cut on a char boundary.
pub fn content_preview(content: &str) -> String {
    content.chars().take(PREVIEW_CHARS).collect()
}
