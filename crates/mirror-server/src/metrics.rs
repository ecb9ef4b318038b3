//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the global Prometheus recorder.
///
/// Returns the handle that renders `/metrics`. Fails if a recorder is
/// already installed in this process.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Sessions started (counter).
pub const SESSIONS_TOTAL: &str = "mirror_sessions_total";
/// Sessions currently running (gauge).
pub const SESSIONS_ACTIVE: &str = "mirror_sessions_active";
/// Sessions ended (counter, labels: outcome).
pub const SESSIONS_CLOSED_TOTAL: &str = "mirror_sessions_closed_total";
/// Session lifetime in seconds (histogram).
pub const SESSION_DURATION_SECONDS: &str = "mirror_session_duration_seconds";
/// Outbound batches sent (counter).
pub const BATCHES_SENT_TOTAL: &str = "mirror_batches_sent_total";
/// Messages sent across all batches (counter).
pub const MESSAGES_SENT_TOTAL: &str = "mirror_messages_sent_total";
/// Messages per outbound batch (histogram).
pub const BATCH_SIZE: &str = "mirror_batch_size";
/// Batches that failed to encode or send (counter).
pub const SEND_ERRORS_TOTAL: &str = "mirror_send_errors_total";
/// Inbound messages applied to the graph (counter).
pub const INBOUND_MESSAGES_TOTAL: &str = "mirror_inbound_messages_total";
/// Inbound payloads that failed to decode (counter).
pub const INBOUND_ERRORS_TOTAL: &str = "mirror_inbound_errors_total";
