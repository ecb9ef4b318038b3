//! Session outcomes and server errors.

use mirror_core::{CodecError, TransportError};
use thiserror::Error;

/// Why a session ended without error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
    /// The peer closed the connection.
    PeerClosed,
    /// The server is shutting down.
    ServerShutdown,
    /// The session was aborted through its handle.
    Aborted,
}

/// Fatal session failures, surfaced as the error outcome of
/// [`Session::run`](crate::session::Session::run).
#[derive(Debug, Error)]
pub enum SessionError {
    /// The transport reported a connection error.
    #[error("transport error: {0}")]
    Transport(#[source] TransportError),
    /// A queued batch could not be sent.
    #[error("failed to send batch: {0}")]
    Send(#[source] TransportError),
    /// A queued batch could not be serialized.
    #[error("{0}")]
    Encode(#[from] CodecError),
}

/// Errors from hosting sessions.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding or serving the listener failed.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}
