//! Glue between a session and its connection.
//!
//! Two tasks per session: the inbound task turns transport events into graph
//! commands or a session outcome, and the outbound task is the single sender
//! that serializes drained batches and writes them in order. Both exit as
//! soon as the session's cancellation signal fires.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use metrics::{counter, histogram};
use mirror_core::{Connection, ErrorSink, ObjectGraph, TransportEvent, decode_message, encode_batch};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::cancel::CancellationCoordinator;
use crate::errors::{CloseReason, SessionError};
use crate::metrics::{
    BATCH_SIZE, BATCHES_SENT_TOTAL, INBOUND_ERRORS_TOTAL, INBOUND_MESSAGES_TOTAL,
    MESSAGES_SENT_TOTAL, SEND_ERRORS_TOTAL,
};
use crate::outbound::Batch;
use crate::session::Completion;

const RECEIVE_FAILED: &str = "Failed to process received message";
const SEND_FAILED: &str = "Failed to send queued messages, aborting session";

#[derive(Clone)]
pub(crate) struct TransportBridge {
    pub(crate) graph: Arc<dyn ObjectGraph>,
    pub(crate) connection: Arc<dyn Connection>,
    pub(crate) errors: Arc<dyn ErrorSink>,
    pub(crate) cancel: CancellationCoordinator,
    pub(crate) completion: Arc<Completion>,
}

impl TransportBridge {
    /// Consume inbound events until the peer goes away or the session is
    /// cancelled.
    pub(crate) async fn run_inbound<S>(self, mut inbound: S)
    where
        S: Stream<Item = TransportEvent> + Send + Unpin + 'static,
    {
        let signal = self.cancel.signal();
        loop {
            let event = tokio::select! {
                biased;
                () = signal.cancelled() => return,
                event = inbound.next() => event,
            };

            match event {
                Some(TransportEvent::Message(text)) => self.dispatch(&text),
                Some(TransportEvent::Error(err)) => {
                    warn!(error = %err, "connection error");
                    self.finish(Err(SessionError::Transport(err)));
                    return;
                }
                Some(TransportEvent::Closed) => {
                    debug!("peer closed connection");
                    self.finish(Ok(CloseReason::PeerClosed));
                    return;
                }
                None => {
                    debug!("inbound stream ended");
                    self.finish(Ok(CloseReason::PeerClosed));
                    return;
                }
            }
        }
    }

    /// Send drained batches in order until cancelled or a send fails.
    pub(crate) async fn run_outbound(self, mut batches: mpsc::UnboundedReceiver<Batch>) {
        let signal = self.cancel.signal();
        loop {
            let batch = tokio::select! {
                biased;
                () = signal.cancelled() => return,
                batch = batches.recv() => match batch {
                    Some(batch) => batch,
                    None => return,
                },
            };

            if let Err(err) = self.transmit(&batch).await {
                counter!(SEND_ERRORS_TOTAL).increment(1);
                self.errors.report(SEND_FAILED, &err);
                self.finish(Err(err));
                return;
            }
        }
    }

    fn dispatch(&self, text: &str) {
        match decode_message(text) {
            Ok(message) => {
                counter!(INBOUND_MESSAGES_TOTAL).increment(1);
                trace!(target_id = %message.target, "applying inbound message");
                self.graph.receive(message);
            }
            Err(err) => {
                counter!(INBOUND_ERRORS_TOTAL).increment(1);
                self.errors.report(RECEIVE_FAILED, &err);
            }
        }
    }

    async fn transmit(&self, batch: &Batch) -> Result<(), SessionError> {
        let payload = encode_batch(batch)?;
        self.connection
            .send(payload)
            .await
            .map_err(SessionError::Send)?;

        let len = batch.len();
        counter!(BATCHES_SENT_TOTAL).increment(1);
        counter!(MESSAGES_SENT_TOTAL).increment(len as u64);
        #[allow(clippy::cast_precision_loss)]
        let size = len as f64;
        histogram!(BATCH_SIZE).record(size);
        trace!(batch_len = len, "batch sent");
        Ok(())
    }

    /// Record the outcome (first writer wins) and cancel the session.
    fn finish(&self, outcome: Result<CloseReason, SessionError>) {
        if !self.completion.resolve(outcome) {
            trace!("session outcome already recorded");
        }
        self.cancel.abort();
    }
}
