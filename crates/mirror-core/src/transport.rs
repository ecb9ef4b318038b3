//! The persistent, message-oriented connection to the peer.

use async_trait::async_trait;

use crate::errors::TransportError;

/// Something that happened on the inbound side of a connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text payload from the peer.
    Message(String),
    /// The connection failed.
    Error(TransportError),
    /// The peer closed the connection cleanly.
    Closed,
}

/// Outbound half of a connection.
#[async_trait]
pub trait Connection: Send + Sync + 'static {
    /// Send one text payload to the peer.
    async fn send(&self, payload: String) -> Result<(), TransportError>;
}
