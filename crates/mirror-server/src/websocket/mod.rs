//! Axum `WebSocket` adapters for the session transport traits.

pub mod connection;
pub mod events;

pub use connection::WsConnection;
pub use events::ws_events;
