//! The server-side object graph a session mirrors.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::errors::GraphError;
use crate::message::Message;

/// Callback invoked once per graph change with the outbound message.
///
/// Graphs may invoke it from any thread.
pub type MessageListener = Arc<dyn Fn(Message) + Send + Sync>;

/// A mutable object model whose changes are mirrored to a peer.
pub trait ObjectGraph: Send + Sync + 'static {
    /// Identifier the peer uses to address the graph's root.
    fn id(&self) -> String;

    /// Register `listener` for change notifications.
    ///
    /// The returned [`Subscription`] removes the listener when revoked or
    /// dropped.
    fn subscribe(&self, listener: MessageListener) -> Subscription;

    /// Apply a command received from the peer.
    fn receive(&self, message: Message);

    /// Whether the root should fill the peer's viewport.
    fn wants_full_screen(&self) -> bool {
        false
    }

    /// Size the root before first render.
    fn set_size(&self, _width: f64, _height: f64) {}

    /// Release resources held by the graph.
    fn dispose(&self) -> Result<(), GraphError> {
        Ok(())
    }
}

type Revoke = Box<dyn FnOnce() + Send>;

/// Handle to a live listener registration.
///
/// Revocation runs at most once, whether via [`Subscription::revoke`] or on
/// drop.
pub struct Subscription {
    revoke: Mutex<Option<Revoke>>,
}

impl Subscription {
    /// Wrap the closure that unregisters the listener.
    pub fn new(revoke: impl FnOnce() + Send + 'static) -> Self {
        Self {
            revoke: Mutex::new(Some(Box::new(revoke))),
        }
    }

    /// A subscription with nothing to undo.
    pub fn noop() -> Self {
        Self {
            revoke: Mutex::new(None),
        }
    }

    /// Unregister the listener. Returns `false` if already revoked.
    pub fn revoke(&self) -> bool {
        let revoke = self.revoke.lock().take();
        match revoke {
            Some(f) => {
                f();
                true
            }
            None => false,
        }
    }

    /// Whether the listener is still registered.
    pub fn is_active(&self) -> bool {
        self.revoke.lock().is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.revoke();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
