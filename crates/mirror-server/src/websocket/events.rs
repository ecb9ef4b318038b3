//! Inbound half of an upgraded socket as a [`TransportEvent`] stream.

use axum::extract::ws;
use futures::stream::{BoxStream, Stream, StreamExt};
use mirror_core::{TransportError, TransportEvent};
use tracing::{debug, info};

/// Map raw frames to transport events.
///
/// Text and UTF-8 binary frames become [`TransportEvent::Message`]; non-UTF-8
/// binary, ping, and pong frames are skipped. A close frame or a read error
/// ends the stream after yielding the matching event.
pub fn ws_events<S, E>(frames: S) -> BoxStream<'static, TransportEvent>
where
    S: Stream<Item = Result<ws::Message, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    frames
        .filter_map(|frame| async move { classify(frame) })
        .scan(false, |done, event| {
            if *done {
                return futures::future::ready(None);
            }
            *done = !matches!(event, TransportEvent::Message(_));
            futures::future::ready(Some(event))
        })
        .boxed()
}

fn classify<E: std::fmt::Display>(frame: Result<ws::Message, E>) -> Option<TransportEvent> {
    match frame {
        Ok(ws::Message::Text(text)) => Some(TransportEvent::Message(text.to_string())),
        Ok(ws::Message::Binary(data)) => match std::str::from_utf8(&data) {
            Ok(text) => Some(TransportEvent::Message(text.to_string())),
            Err(_) => {
                info!(len = data.len(), "received non-UTF8 binary frame");
                None
            }
        },
        Ok(ws::Message::Close(frame)) => {
            debug!(?frame, "peer sent close frame");
            Some(TransportEvent::Closed)
        }
        Ok(ws::Message::Ping(_) | ws::Message::Pong(_)) => None,
        Err(e) => Some(TransportEvent::Error(TransportError::Connection(e.to_string()))),
    }
}
