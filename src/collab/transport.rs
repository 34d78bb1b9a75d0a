//! Transport boundary for delegation.
//!
//! The core only needs to send messages to an endpoint; replies arrive
//! asynchronously through [`ResponseRouter::dispatch`]. Connection
//! establishment, retries and authentication belong to the implementor.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::message::AgentMessage;
use super::router::ResponseRouter;
use super::types::{AgentReference, EndpointKey};

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("Connection closed: {0}")]
    Closed(String),

    #[error("Send failed: {0}")]
    Send(String),
}

/// Outbound channel to one endpoint.
#[async_trait]
pub trait Connection: Send + Sync {
    fn endpoint(&self) -> &EndpointKey;

    async fn send(&self, message: AgentMessage) -> Result<(), TransportError>;
}

/// Opens connections. Inbound messages for a connection must be handed to
/// `router`.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        agent: &AgentReference,
        router: Arc<ResponseRouter>,
    ) -> Result<Arc<dyn Connection>, TransportError>;
}
