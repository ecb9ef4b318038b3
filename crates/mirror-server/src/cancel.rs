//! Linked cancellation for a single session.
//!
//! The session token is a child of the server's shutdown token: it fires when
//! the server shuts down *or* when the session aborts itself, and aborting a
//! session never touches the server token.

use tokio_util::sync::CancellationToken;

/// Merges the server-wide shutdown signal with a session-local abort.
#[derive(Clone, Debug)]
pub struct CancellationCoordinator {
    server: CancellationToken,
    session: CancellationToken,
}

impl CancellationCoordinator {
    /// Link a new session abort signal to `server`.
    pub fn new(server: &CancellationToken) -> Self {
        Self {
            server: server.clone(),
            session: server.child_token(),
        }
    }

    /// Trigger the session-local signal. Idempotent.
    pub fn abort(&self) {
        self.session.cancel();
    }

    /// The combined signal.
    pub fn signal(&self) -> CancellationToken {
        self.session.clone()
    }

    /// Whether either source has fired.
    pub fn is_cancelled(&self) -> bool {
        self.session.is_cancelled()
    }

    /// Whether the server-wide signal has fired.
    pub fn is_server_shutdown(&self) -> bool {
        self.server.is_cancelled()
    }

    /// Resolves once the combined signal fires.
    pub async fn cancelled(&self) {
        self.session.cancelled().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncancelled() {
        let server = CancellationToken::new();
        let coord = CancellationCoordinator::new(&server);
        assert!(!coord.is_cancelled());
        assert!(!coord.is_server_shutdown());
    }

    #[test]
    fn abort_is_local() {
        let server = CancellationToken::new();
        let coord = CancellationCoordinator::new(&server);
        coord.abort();
        assert!(coord.is_cancelled());
        assert!(!server.is_cancelled());
        assert!(!coord.is_server_shutdown());
    }

    #[test]
    fn server_shutdown_cancels_session() {
        let server = CancellationToken::new();
        let coord = CancellationCoordinator::new(&server);
        let signal = coord.signal();
        server.cancel();
        assert!(coord.is_cancelled());
        assert!(signal.is_cancelled());
        assert!(coord.is_server_shutdown());
    }

    #[test]
    fn abort_does_not_affect_sibling_sessions() {
        let server = CancellationToken::new();
        let a = CancellationCoordinator::new(&server);
        let b = CancellationCoordinator::new(&server);
        a.abort();
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());
    }

    #[test]
    fn repeated_abort_is_idempotent() {
        let server = CancellationToken::new();
        let coord = CancellationCoordinator::new(&server);
        coord.abort();
        coord.abort();
        server.cancel();
        coord.abort();
        assert!(coord.is_cancelled());
    }

    #[test]
    fn concurrent_abort() {
        let server = CancellationToken::new();
        let coord = CancellationCoordinator::new(&server);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = coord.clone();
                std::thread::spawn(move || c.abort())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(coord.is_cancelled());
    }

    #[test]
    fn already_shut_down_server_yields_cancelled_session() {
        let server = CancellationToken::new();
        server.cancel();
        let coord = CancellationCoordinator::new(&server);
        assert!(coord.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_future_resolves_on_abort() {
        let server = CancellationToken::new();
        let coord = CancellationCoordinator::new(&server);
        let waiter = coord.clone();

        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
            true
        });

        coord.abort();
        assert!(handle.await.unwrap());
    }
}
