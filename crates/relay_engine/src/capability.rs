use relay_core::ConnectorParams;

use crate::{ConnectorError, SendError};

/// A conversational backend. Calls may block on network IO, so the engine
/// only ever invokes them from the blocking pool, never on the loop thread.
pub trait Connector: Send + Sync {
    fn call(&self, text: &str, params: &ConnectorParams) -> Result<String, ConnectorError>;
}

/// Where replies are delivered, e.g. one chat window.
///
/// Implementations need not be reentrant: the engine never has two `send`
/// calls in flight at once, across all destinations.
pub trait Destination: Send + Sync {
    /// Stable identity used to build job ids.
    fn identity(&self) -> &str;

    fn send(&self, text: &str, mention: Option<&str>) -> Result<(), SendError>;
}
