//! In-memory graph, connection, and error sink for session tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use mirror_core::{
    Connection, ErrorSink, GraphError, Message, MessageListener, ObjectGraph, Subscription,
    TransportError,
};
use parking_lot::Mutex;

type Listeners = Arc<Mutex<Vec<(u64, MessageListener)>>>;

pub(crate) struct MockGraph {
    id: String,
    listeners: Listeners,
    next_listener: AtomicU64,
    received: Mutex<Vec<Message>>,
    unsubscribed: Arc<AtomicUsize>,
    disposed: AtomicBool,
    dispose_fails: bool,
    full_screen: bool,
    size: Mutex<Option<(f64, f64)>>,
}

impl MockGraph {
    pub(crate) fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            listeners: Arc::default(),
            next_listener: AtomicU64::new(0),
            received: Mutex::default(),
            unsubscribed: Arc::default(),
            disposed: AtomicBool::new(false),
            dispose_fails: false,
            full_screen: false,
            size: Mutex::new(None),
        }
    }

    pub(crate) fn full_screen(mut self) -> Self {
        self.full_screen = true;
        self
    }

    pub(crate) fn failing_dispose(mut self) -> Self {
        self.dispose_fails = true;
        self
    }

    /// Notify every subscriber, as a graph mutation would.
    pub(crate) fn emit(&self, message: &Message) {
        let listeners: Vec<MessageListener> =
            self.listeners.lock().iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener(message.clone());
        }
    }

    pub(crate) fn received(&self) -> Vec<Message> {
        self.received.lock().clone()
    }

    pub(crate) fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    pub(crate) fn unsubscribed(&self) -> usize {
        self.unsubscribed.load(Ordering::SeqCst)
    }

    pub(crate) fn disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub(crate) fn size(&self) -> Option<(f64, f64)> {
        *self.size.lock()
    }
}

impl ObjectGraph for MockGraph {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn subscribe(&self, listener: MessageListener) -> Subscription {
        let key = self.next_listener.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().push((key, listener));

        let listeners = Arc::clone(&self.listeners);
        let unsubscribed = Arc::clone(&self.unsubscribed);
        Subscription::new(move || {
            listeners.lock().retain(|(k, _)| *k != key);
            let _ = unsubscribed.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn receive(&self, message: Message) {
        self.received.lock().push(message);
    }

    fn wants_full_screen(&self) -> bool {
        self.full_screen
    }

    fn set_size(&self, width: f64, height: f64) {
        *self.size.lock() = Some((width, height));
    }

    fn dispose(&self) -> Result<(), GraphError> {
        self.disposed.store(true, Ordering::SeqCst);
        if self.dispose_fails {
            return Err(GraphError::Dispose {
                id: self.id.clone(),
                message: "still referenced".into(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MockConnection {
    sent: Mutex<Vec<String>>,
    fail: AtomicBool,
    failures: AtomicUsize,
}

impl MockConnection {
    pub(crate) fn failing() -> Self {
        let conn = Self::default();
        conn.fail.store(true, Ordering::SeqCst);
        conn
    }

    pub(crate) fn batches(&self) -> Vec<Vec<Message>> {
        self.sent
            .lock()
            .iter()
            .map(|payload| serde_json::from_str(payload).unwrap())
            .collect()
    }

    pub(crate) fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn send(&self, payload: String) -> Result<(), TransportError> {
        if self.fail.load(Ordering::SeqCst) {
            let _ = self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(TransportError::Send("socket gone".into()));
        }
        self.sent.lock().push(payload);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    reports: Mutex<Vec<(String, String)>>,
}

impl RecordingSink {
    pub(crate) fn descriptions(&self) -> Vec<String> {
        self.reports.lock().iter().map(|(d, _)| d.clone()).collect()
    }
}

impl ErrorSink for RecordingSink {
    fn report(&self, description: &str, error: &(dyn std::error::Error + 'static)) {
        self.reports
            .lock()
            .push((description.to_string(), error.to_string()));
    }
}
