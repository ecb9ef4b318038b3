//! # mirror-core
//!
//! Shared vocabulary for mirror sessions.
//!
//! - **Messages**: [`Message`] command records and the JSON batch codec
//! - **Object graph**: the [`ObjectGraph`] trait and its RAII [`Subscription`]
//! - **Transport**: the [`Connection`] send primitive and inbound [`TransportEvent`]s
//! - **Errors**: [`CodecError`], [`TransportError`], [`GraphError`] via `thiserror`
//! - **Reporting**: the [`ErrorSink`] diagnostic callback
//! - **Logging**: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod errors;
pub mod graph;
pub mod logging;
pub mod message;
pub mod report;
pub mod transport;

pub use errors::{CodecError, GraphError, TransportError};
pub use graph::{MessageListener, ObjectGraph, Subscription};
pub use message::{Message, MessageKind, decode_message, encode_batch};
pub use report::{ErrorSink, TracingErrorSink};
pub use transport::{Connection, TransportEvent};
