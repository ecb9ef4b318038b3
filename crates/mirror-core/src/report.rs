//! Diagnostic sink for fatal and non-fatal session errors.

use std::error::Error;

use tracing::error;

/// Receives `(description, error)` pairs; never changes control flow.
pub trait ErrorSink: Send + Sync + 'static {
    /// Record a failure.
    fn report(&self, description: &str, error: &(dyn Error + 'static));
}

/// Default sink: logs through `tracing` at error level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, description: &str, err: &(dyn Error + 'static)) {
        error!(error = %err, "{description}");
    }
}
