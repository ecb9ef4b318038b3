//! Live sessions tracked by the hosting server.

use std::collections::HashMap;

use tokio::sync::RwLock;
use tracing::debug;

use crate::session::SessionHandle;

/// Handles of running sessions, keyed by session id.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a session.
    pub async fn add(&self, handle: SessionHandle) {
        let id = handle.id().to_string();
        debug!(session_id = %id, "session registered");
        let _ = self.sessions.write().await.insert(id, handle);
    }

    /// Stop tracking a session. Returns its handle if it was present.
    pub async fn remove(&self, id: &str) -> Option<SessionHandle> {
        let removed = self.sessions.write().await.remove(id);
        if removed.is_some() {
            debug!(session_id = %id, "session unregistered");
        }
        removed
    }

    /// Look up a session by id.
    pub async fn get(&self, id: &str) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Number of tracked sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Abort every tracked session.
    pub async fn abort_all(&self) {
        for handle in self.sessions.read().await.values() {
            handle.abort();
        }
    }
}
