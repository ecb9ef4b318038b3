//! Outbound half of an upgraded socket.

use async_trait::async_trait;
use axum::extract::ws::{self, WebSocket};
use futures::SinkExt;
use futures::stream::SplitSink;
use mirror_core::{Connection, TransportError};
use tokio::sync::Mutex;
use tracing::debug;

/// [`Connection`] that writes each payload as one text frame.
pub struct WsConnection {
    sink: Mutex<SplitSink<WebSocket, ws::Message>>,
}

impl WsConnection {
    /// Wrap the write half of a split socket.
    pub fn new(sink: SplitSink<WebSocket, ws::Message>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }

    /// Send a close frame and flush. Errors are ignored; the peer may
    /// already be gone.
    pub async fn close(&self) {
        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.send(ws::Message::Close(None)).await {
            debug!(error = %e, "close frame not delivered");
        }
        let _ = sink.close().await;
    }
}

#[async_trait]
impl Connection for WsConnection {
    async fn send(&self, payload: String) -> Result<(), TransportError> {
        self.sink
            .lock()
            .await
            .send(ws::Message::Text(payload.into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}
