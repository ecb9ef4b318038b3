//! Server-wide shutdown signal.
//!
//! Every session links its own cancellation to [`ShutdownCoordinator::token`],
//! so cancelling it winds down all sessions at once.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Owns the global shutdown token.
#[derive(Clone, Debug, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a coordinator with a fresh token.
    pub fn new() -> Self {
        Self::default()
    }

    /// A clone of the shutdown token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Signal shutdown to every linked session.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has been signalled.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Trigger shutdown on Ctrl-C.
    ///
    /// Returns immediately; the listener runs on a background task until the
    /// signal arrives or shutdown happens some other way.
    pub fn shutdown_on_ctrl_c(&self) -> JoinHandle<()> {
        let token = self.token.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                res = tokio::signal::ctrl_c() => {
                    if let Err(e) = res {
                        warn!(error = %e, "failed to listen for ctrl-c");
                        return;
                    }
                    info!("ctrl-c received, shutting down");
                    token.cancel();
                }
            }
        })
    }

    /// Signal shutdown, then wait up to `timeout` for `handles` to finish.
    pub async fn graceful_shutdown(&self, handles: Vec<JoinHandle<()>>, timeout: Duration) {
        self.shutdown();
        info!(
            task_count = handles.len(),
            timeout_secs = timeout.as_secs(),
            "waiting for sessions to finish"
        );

        let drain = futures::future::join_all(handles);
        if tokio::time::timeout(timeout, drain).await.is_err() {
            warn!("shutdown timed out after {timeout:?}, some sessions may still be running");
        }
    }
}
