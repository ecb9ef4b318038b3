use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default upper bound on outbound batches per second.
pub const DEFAULT_MAX_FPS: f64 = 30.0;

/// Lowest accepted `max_fps`: one batch per hour.
pub const MIN_MAX_FPS: f64 = 1.0 / 3600.0;

/// Highest accepted `max_fps`: one batch per millisecond.
pub const MAX_MAX_FPS: f64 = 1000.0;

/// Whether `fps` lies in `MIN_MAX_FPS..=MAX_MAX_FPS`.
pub fn is_valid_max_fps(fps: f64) -> bool {
    (MIN_MAX_FPS..=MAX_MAX_FPS).contains(&fps)
}

/// Per-connection session behavior.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Maximum outbound batches per second.
    pub max_fps: f64,
    /// Dispose the object graph when its session ends.
    pub dispose_graph_after_session: bool,
    /// Width applied to full-screen graphs before first render.
    pub initial_width: f64,
    /// Height applied to full-screen graphs before first render.
    pub initial_height: f64,
}

impl SessionSettings {
    /// Minimum spacing between batch transmits (`1 / max_fps`).
    ///
    /// Falls back to [`DEFAULT_MAX_FPS`] when `max_fps` is outside
    /// `MIN_MAX_FPS..=MAX_MAX_FPS`, so the interval stays between 1 ms and
    /// 1 h.
    pub fn throttle_interval(&self) -> Duration {
        let fps = if is_valid_max_fps(self.max_fps) {
            self.max_fps
        } else {
            DEFAULT_MAX_FPS
        };
        Duration::from_secs_f64(1.0 / fps)
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_fps: DEFAULT_MAX_FPS,
            dispose_graph_after_session: true,
            initial_width: 640.0,
            initial_height: 480.0,
        }
    }
}
