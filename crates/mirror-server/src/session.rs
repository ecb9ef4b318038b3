//! Session lifecycle: subscribe, run until cancelled, tear down in order.
//!
//! ```text
//! Starting ──▶ Running ──▶ Closing ──▶ Closed
//! ```
//!
//! A session subscribes to its graph, queues the attach command, and starts
//! the inbound and outbound bridge tasks. It then waits on the linked
//! cancellation signal. Teardown revokes the subscription, closes the queue,
//! optionally disposes the graph, and returns the first recorded outcome.

use std::sync::Arc;

use futures::Stream;
use metrics::{counter, gauge, histogram};
use mirror_core::{
    Connection, ErrorSink, Message, ObjectGraph, TracingErrorSink, TransportEvent,
};
use mirror_settings::SessionSettings;
use parking_lot::Mutex;
use serde_json::json;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::bridge::TransportBridge;
use crate::cancel::CancellationCoordinator;
use crate::errors::{CloseReason, SessionError};
use crate::metrics::{
    SESSION_DURATION_SECONDS, SESSIONS_ACTIVE, SESSIONS_CLOSED_TOTAL, SESSIONS_TOTAL,
};
use crate::outbound::OutboundQueue;

const DISPOSE_FAILED: &str = "Failed to dispose of element";

/// Lifecycle phase of a session. Only ever moves forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    /// Created; not yet subscribed.
    Starting,
    /// Subscribed and bridged to the transport.
    Running,
    /// Cancellation fired; tearing down.
    Closing,
    /// Torn down. Terminal.
    Closed,
}

type Outcome = Result<CloseReason, SessionError>;

enum Slot {
    Pending,
    Resolved(Outcome),
    Taken,
}

/// One-shot outcome cell. The first `resolve` wins.
pub(crate) struct Completion {
    slot: Mutex<Slot>,
}

impl Completion {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Pending),
        }
    }

    /// Record `outcome` if nothing has been recorded yet.
    pub(crate) fn resolve(&self, outcome: Outcome) -> bool {
        let mut slot = self.slot.lock();
        if matches!(*slot, Slot::Pending) {
            *slot = Slot::Resolved(outcome);
            true
        } else {
            false
        }
    }

    /// Take the recorded outcome, leaving the cell spent.
    pub(crate) fn take(&self) -> Option<Outcome> {
        let mut slot = self.slot.lock();
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Resolved(outcome) => Some(outcome),
            Slot::Pending => {
                *slot = Slot::Pending;
                None
            }
            Slot::Taken => None,
        }
    }
}

struct Shared {
    id: String,
    state: Mutex<SessionState>,
    cancel: CancellationCoordinator,
}

impl Shared {
    fn advance(&self, next: SessionState) {
        let mut state = self.state.lock();
        if next > *state {
            debug!(from = ?*state, to = ?next, "session state");
            *state = next;
        }
    }
}

/// Cloneable view of a session for hosts and tests.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

impl SessionHandle {
    /// Session identifier.
    pub fn id(&self) -> &str {
        &self.shared.id
    }

    /// Current lifecycle phase.
    pub fn state(&self) -> SessionState {
        *self.shared.state.lock()
    }

    /// Ask the session to stop. Idempotent.
    pub fn abort(&self) {
        self.shared.cancel.abort();
    }

    /// Whether the session's cancellation signal has fired.
    pub fn is_cancelled(&self) -> bool {
        self.shared.cancel.is_cancelled()
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .finish()
    }
}

/// A single peer connection mirroring one object graph.
pub struct Session {
    shared: Arc<Shared>,
    graph: Arc<dyn ObjectGraph>,
    connection: Arc<dyn Connection>,
    errors: Arc<dyn ErrorSink>,
    settings: SessionSettings,
}

impl Session {
    /// Create a session whose cancellation is linked to `shutdown`.
    pub fn new(
        graph: Arc<dyn ObjectGraph>,
        connection: Arc<dyn Connection>,
        settings: SessionSettings,
        shutdown: &CancellationToken,
    ) -> Self {
        let id = format!("sess_{}", uuid::Uuid::now_v7().simple());
        Self {
            shared: Arc::new(Shared {
                id,
                state: Mutex::new(SessionState::Starting),
                cancel: CancellationCoordinator::new(shutdown),
            }),
            graph,
            connection,
            errors: Arc::new(TracingErrorSink),
            settings,
        }
    }

    /// Route error reports to `sink` instead of the log.
    #[must_use]
    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        self.errors = sink;
        self
    }

    /// A handle that outlives `run`.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Session identifier.
    pub fn id(&self) -> &str {
        &self.shared.id
    }

    /// Run the session until the peer leaves, a fatal error occurs, the
    /// handle aborts it, or the server shuts down.
    ///
    /// Dropping the returned future cancels the session and revokes its
    /// graph subscription.
    #[instrument(skip_all, fields(session_id = %self.shared.id))]
    pub async fn run<S>(self, inbound: S) -> Result<CloseReason, SessionError>
    where
        S: Stream<Item = TransportEvent> + Send + Unpin + 'static,
    {
        let started = Instant::now();
        counter!(SESSIONS_TOTAL).increment(1);
        gauge!(SESSIONS_ACTIVE).increment(1.0);

        let cancel = self.shared.cancel.clone();
        let _cancel_on_drop = cancel.signal().drop_guard();
        let completion = Arc::new(Completion::new());
        let (queue, batches) = OutboundQueue::new(self.settings.throttle_interval());

        let listener_queue = Arc::clone(&queue);
        let subscription = self
            .graph
            .subscribe(Arc::new(move |message| listener_queue.enqueue(message)));

        if self.graph.wants_full_screen() {
            self.graph
                .set_size(self.settings.initial_width, self.settings.initial_height);
        }
        queue.enqueue(Message::call(
            "document.body",
            "appendChild",
            json!([self.graph.id()]),
        ));

        let bridge = TransportBridge {
            graph: Arc::clone(&self.graph),
            connection: Arc::clone(&self.connection),
            errors: Arc::clone(&self.errors),
            cancel: cancel.clone(),
            completion: Arc::clone(&completion),
        };
        let _ = tokio::spawn(bridge.clone().run_inbound(inbound));
        let _ = tokio::spawn(bridge.run_outbound(batches));
        self.shared.advance(SessionState::Running);
        info!(graph_id = %self.graph.id(), "session running");

        cancel.cancelled().await;
        let fallback = if cancel.is_server_shutdown() {
            CloseReason::ServerShutdown
        } else {
            CloseReason::Aborted
        };
        let _ = completion.resolve(Ok(fallback));
        self.shared.advance(SessionState::Closing);

        let _ = subscription.revoke();
        queue.close();

        if self.settings.dispose_graph_after_session {
            if let Err(err) = self.graph.dispose() {
                self.errors.report(DISPOSE_FAILED, &err);
            }
        }

        let outcome = completion.take().unwrap_or(Ok(fallback));
        self.shared.advance(SessionState::Closed);

        gauge!(SESSIONS_ACTIVE).decrement(1.0);
        counter!(SESSIONS_CLOSED_TOTAL, "outcome" => outcome_label(&outcome)).increment(1);
        histogram!(SESSION_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        match &outcome {
            Ok(reason) => info!(?reason, "session closed"),
            Err(err) => info!(error = %err, "session failed"),
        }
        outcome
    }
}

fn outcome_label(outcome: &Outcome) -> &'static str {
    match outcome {
        Ok(CloseReason::PeerClosed) => "peer_closed",
        Ok(CloseReason::ServerShutdown) => "server_shutdown",
        Ok(CloseReason::Aborted) => "aborted",
        Err(SessionError::Transport(_)) => "transport_error",
        Err(SessionError::Send(_) | SessionError::Encode(_)) => "send_error",
    }
}
