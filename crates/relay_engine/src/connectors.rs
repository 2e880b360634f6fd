use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use relay_core::ConnectorParams;
use relay_logging::{relay_debug, relay_warn};

use crate::{Connector, ConnectorError};

/// Routes each call to the connector registered for `params.platform`
/// (case-insensitive), falling back to a default connector when one is set.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    by_platform: HashMap<String, Arc<dyn Connector>>,
    fallback: Option<Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, platform: &str, connector: Arc<dyn Connector>) -> Self {
        self.by_platform
            .insert(platform.to_ascii_lowercase(), connector);
        self
    }

    pub fn with_fallback(mut self, connector: Arc<dyn Connector>) -> Self {
        self.fallback = Some(connector);
        self
    }

    pub fn platforms(&self) -> Vec<String> {
        let mut names: Vec<_> = self.by_platform.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn resolve(&self, platform: &str) -> Result<Arc<dyn Connector>, ConnectorError> {
        self.by_platform
            .get(&platform.to_ascii_lowercase())
            .or(self.fallback.as_ref())
            .cloned()
            .ok_or_else(|| ConnectorError::UnknownPlatform {
                platform: platform.to_string(),
            })
    }
}

impl Connector for ConnectorRegistry {
    fn call(&self, text: &str, params: &ConnectorParams) -> Result<String, ConnectorError> {
        let connector = self.resolve(&params.platform)?;
        relay_debug!("routing call to platform {}", params.platform);
        connector.call(text, params)
    }
}

/// Retries a failing connector a fixed number of times with a fixed pause.
///
/// Only transport failures are retried; `UnknownPlatform` and invalid
/// responses fail immediately. Runs on the blocking pool, so the pause is a
/// plain thread sleep.
pub struct RetryingConnector {
    inner: Arc<dyn Connector>,
    attempts: u32,
    pause: Duration,
}

impl RetryingConnector {
    pub fn new(inner: Arc<dyn Connector>, attempts: u32, pause: Duration) -> Self {
        Self {
            inner,
            attempts: attempts.max(1),
            pause,
        }
    }
}

impl Connector for RetryingConnector {
    fn call(&self, text: &str, params: &ConnectorParams) -> Result<String, ConnectorError> {
        let mut attempt = 1;
        loop {
            match self.inner.call(text, params) {
                Err(err @ ConnectorError::Request { .. }) if attempt < self.attempts => {
                    relay_warn!(
                        "{} call failed (attempt {}/{}), retrying: {}",
                        params.platform,
                        attempt,
                        self.attempts,
                        err
                    );
                    attempt += 1;
                    std::thread::sleep(self.pause);
                }
                outcome => return outcome,
            }
        }
    }
}

/// Replies with the inbound text. Handy for wiring checks without a backend.
#[derive(Debug, Clone, Default)]
pub struct EchoConnector {
    prefix: String,
}

impl EchoConnector {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Connector for EchoConnector {
    fn call(&self, text: &str, _params: &ConnectorParams) -> Result<String, ConnectorError> {
        Ok(format!("{}{}", self.prefix, text))
    }
}
