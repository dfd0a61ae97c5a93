//! Transport abstraction over the MQTT client.
//!
//! [`BrokerConnection`](crate::connection::BrokerConnection) drives a
//! [`Transport`] and never touches the MQTT client directly, so tests can
//! substitute an in-memory implementation.

use async_trait::async_trait;

/// A raw message received from the broker.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Transport-level failure.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Could not establish the session.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The session broke mid-flight.
    #[error("transport i/o error: {0}")]
    Io(String),

    /// The transport was shut down and will produce no more messages.
    #[error("transport closed")]
    Closed,
}

/// A bidirectional session with the broker.
///
/// Methods take `&self`; implementations handle their own interior locking.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish the session, blocking until the broker accepts it.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Subscribe to a topic filter.
    async fn subscribe(&self, filter: &str) -> Result<(), TransportError>;

    /// Publish a message.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), TransportError>;

    /// Wait for the next inbound message.
    async fn next_message(&self) -> Result<InboundMessage, TransportError>;

    /// Tear the session down.
    async fn disconnect(&self) -> Result<(), TransportError>;
}
