//! # mirror-server
//!
//! Per-connection sessions that keep a server-side object graph in sync with
//! a remote peer.
//!
//! - [`cancel`]: linked server-shutdown / session-abort cancellation
//! - [`outbound`]: rate-limited batching of outbound messages
//! - [`session`]: the session state machine and ordered teardown
//! - [`server`]: Axum `WebSocket` hosting, health, and metrics endpoints
//! - Graceful shutdown via `tokio::signal` + `CancellationToken`

#![deny(unsafe_code)]

mod bridge;
pub mod cancel;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod outbound;
pub mod registry;
pub mod server;
pub mod session;
pub mod shutdown;
pub mod websocket;

#[cfg(test)]
pub(crate) mod test_support;

pub use cancel::CancellationCoordinator;
pub use errors::{CloseReason, ServerError, SessionError};
pub use outbound::OutboundQueue;
pub use registry::SessionRegistry;
pub use server::{ConnectParams, GraphFactory, MirrorServer};
pub use session::{Session, SessionHandle, SessionState};
pub use shutdown::ShutdownCoordinator;
