//! Command records exchanged with the remote peer.
//!
//! A [`Message`] names a target object, an operation kind, and optional
//! key/value payload. The session layer never interprets them; it only keeps
//! their order and ships them in batches. On the wire a batch is a JSON array
//! of messages and an inbound payload is a single JSON message.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::CodecError;

/// Operation carried by a [`Message`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageKind {
    /// Create a new object.
    Create,
    /// Set a property.
    Set,
    /// Set an attribute.
    SetAttribute,
    /// Remove an attribute.
    RemoveAttribute,
    /// Invoke a method.
    Call,
    /// Start listening for an event.
    Listen,
    /// An event raised by the peer.
    Event,
}

/// A single command record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Operation kind.
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Identifier of the object the command applies to.
    pub target: String,
    /// Property, attribute, method, or event name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Command payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Message {
    /// Invoke `method` on `target` with `args`.
    pub fn call(target: impl Into<String>, method: impl Into<String>, args: Value) -> Self {
        Self {
            kind: MessageKind::Call,
            target: target.into(),
            key: Some(method.into()),
            value: Some(args),
        }
    }

    /// Set `property` on `target`.
    pub fn set(target: impl Into<String>, property: impl Into<String>, value: Value) -> Self {
        Self {
            kind: MessageKind::Set,
            target: target.into(),
            key: Some(property.into()),
            value: Some(value),
        }
    }

    /// An event named `name` raised on `target`.
    pub fn event(target: impl Into<String>, name: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            kind: MessageKind::Event,
            target: target.into(),
            key: Some(name.into()),
            value,
        }
    }
}

/// Serialize a batch as one JSON array, preserving order.
pub fn encode_batch(batch: &[Message]) -> Result<String, CodecError> {
    serde_json::to_string(batch).map_err(|source| CodecError::Encode {
        len: batch.len(),
        source,
    })
}

/// Parse one inbound message.
pub fn decode_message(payload: &str) -> Result<Message, CodecError> {
    serde_json::from_str(payload).map_err(CodecError::Decode)
}
