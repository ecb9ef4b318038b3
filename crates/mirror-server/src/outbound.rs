//! Rate-limited outbound message queue.
//!
//! Producers call [`OutboundQueue::enqueue`] from any thread. The first
//! enqueue after a flush arms a one-shot deferred task on the runtime; it
//! fires one interval later and drains everything pending into a single
//! batch. At most one batch starts per interval, and every message is flushed
//! within one interval of being enqueued.
//!
//! Draining swaps the pending `Vec` out and pushes it onto an ordered channel
//! inside the same critical section, so batches reach the sender in drain
//! order and no message appears in two batches. Serialization and I/O happen
//! on the receiving end, outside the lock.

use std::sync::Arc;
use std::time::Duration;

use mirror_core::Message;
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Messages drained together and sent in one transport write.
pub type Batch = Vec<Message>;

struct QueueState {
    pending: Vec<Message>,
    /// A deferred flush is scheduled or running.
    armed: bool,
    closed: bool,
    last_transmit: Option<Instant>,
}

/// Throttled queue feeding a session's outbound channel.
pub struct OutboundQueue {
    state: Mutex<QueueState>,
    interval: Duration,
    batches: mpsc::UnboundedSender<Batch>,
    runtime: Handle,
}

impl OutboundQueue {
    /// Create a queue that releases at most one batch per `interval`.
    ///
    /// Must be called from within a Tokio runtime; the deferred flush tasks
    /// are spawned on it even when `enqueue` is called from foreign threads.
    pub fn new(interval: Duration) -> (Arc<Self>, mpsc::UnboundedReceiver<Batch>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = Arc::new(Self {
            state: Mutex::new(QueueState {
                pending: Vec::new(),
                armed: false,
                closed: false,
                last_transmit: None,
            }),
            interval,
            batches: tx,
            runtime: Handle::current(),
        });
        (queue, rx)
    }

    /// Append a message and arm the throttle if it is idle.
    ///
    /// Never blocks on I/O. Messages enqueued after [`close`](Self::close)
    /// are dropped.
    pub fn enqueue(self: &Arc<Self>, message: Message) {
        let mut state = self.state.lock();
        if state.closed {
            debug!("outbound queue closed, dropping message");
            return;
        }
        state.pending.push(message);
        if state.armed {
            return;
        }
        state.armed = true;
        drop(state);

        let queue = Arc::clone(self);
        let _ = self.runtime.spawn(queue.flush_when_due());
    }

    /// Move all pending messages into a batch and hand it to the sender now.
    ///
    /// Returns the number of messages drained; an empty queue sends nothing
    /// and leaves the throttle clock untouched.
    pub fn drain(&self) -> usize {
        let mut state = self.state.lock();
        self.drain_locked(&mut state, Instant::now())
    }

    /// Stop accepting messages and discard anything pending.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        let dropped = std::mem::take(&mut state.pending).len();
        if dropped > 0 {
            debug!(dropped, "discarded pending messages on close");
        }
    }

    /// Number of messages waiting for the next batch.
    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Whether a deferred flush is scheduled.
    pub fn is_armed(&self) -> bool {
        self.state.lock().armed
    }

    /// Configured minimum spacing between batches.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    async fn flush_when_due(self: Arc<Self>) {
        let mut deadline = Instant::now() + self.interval;
        loop {
            tokio::time::sleep_until(deadline).await;
            match self.tick(Instant::now()) {
                Some(next) => deadline = next,
                None => return,
            }
        }
    }

    /// One throttle tick. Returns the next deadline if the interval since the
    /// last transmit has not yet elapsed.
    fn tick(&self, now: Instant) -> Option<Instant> {
        let mut state = self.state.lock();
        if let Some(last) = state.last_transmit {
            if now.duration_since(last) < self.interval {
                trace!("throttle tick too early, staying armed");
                return Some(last + self.interval);
            }
        }
        state.armed = false;
        let _ = self.drain_locked(&mut state, now);
        None
    }

    fn drain_locked(&self, state: &mut QueueState, now: Instant) -> usize {
        if state.pending.is_empty() {
            return 0;
        }
        let batch = std::mem::take(&mut state.pending);
        let len = batch.len();
        state.last_transmit = Some(now);
        if self.batches.send(batch).is_err() {
            debug!(batch_len = len, "outbound channel closed, dropping batch");
        } else {
            trace!(batch_len = len, "batch drained");
        }
        len
    }
}
