//! Error types shared by the session crates.
//!
//! Each collaborator boundary gets its own enum so callers can tell a
//! malformed payload ([`CodecError`]) from a dead connection
//! ([`TransportError`]) or a failing graph ([`GraphError`]).

use thiserror::Error;

/// Serialization failures for messages and batches.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The outbound batch could not be encoded.
    #[error("failed to encode batch of {len} messages: {source}")]
    Encode {
        /// Number of messages in the batch.
        len: usize,
        /// Underlying serializer error.
        #[source]
        source: serde_json::Error,
    },
    /// An inbound payload was not a valid message.
    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Failures reported by (or while talking to) the transport connection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The connection is already closed.
    #[error("connection closed")]
    Closed,
    /// The peer or the network reported an error.
    #[error("connection error: {0}")]
    Connection(String),
    /// A send did not reach the peer.
    #[error("send failed: {0}")]
    Send(String),
}

/// Failures raised by an object graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Releasing the graph's resources failed.
    #[error("failed to dispose graph {id}: {message}")]
    Dispose {
        /// Graph identifier.
        id: String,
        /// What went wrong.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_display() {
        let json_err = serde_json::from_str::<serde_json::Value>("{bad").unwrap_err();
        let err = CodecError::Decode(json_err);
        assert!(err.to_string().starts_with("failed to decode message"));
    }

    #[test]
    fn encode_error_mentions_len() {
        let json_err = serde_json::from_str::<serde_json::Value>("]").unwrap_err();
        let err = CodecError::Encode {
            len: 3,
            source: json_err,
        };
        assert!(err.to_string().contains("batch of 3 messages"));
    }

    #[test]
    fn transport_error_display() {
        assert_eq!(TransportError::Closed.to_string(), "connection closed");
        assert_eq!(
            TransportError::Send("broken pipe".into()).to_string(),
            "send failed: broken pipe"
        );
    }

    #[test]
    fn dispose_error_display() {
        let err = GraphError::Dispose {
            id: "g1".into(),
            message: "still rendering".into(),
        };
        assert_eq!(err.to_string(), "failed to dispose graph g1: still rendering");
    }
}
