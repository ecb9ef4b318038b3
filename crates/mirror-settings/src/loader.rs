//! Settings loading with deep merge and environment variable overrides.
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::{MAX_MAX_FPS, MIN_MAX_FPS, MirrorSettings};

/// Resolve the path to the settings file (`~/.mirror/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".mirror").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<MirrorSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<MirrorSettings> {
    let mut settings = read_settings_file(path)?;
    apply_overrides(&mut settings, |name| std::env::var(name).ok());
    Ok(settings)
}

fn read_settings_file(path: &Path) -> Result<MirrorSettings> {
    let defaults = serde_json::to_value(MirrorSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply `MIRROR_*` overrides read through `lookup`.
///
/// Empty or unparsable values are ignored (with a warning for the latter).
pub fn apply_overrides(settings: &mut MirrorSettings, lookup: impl Fn(&str) -> Option<String>) {
    let read = |name: &str| lookup(name).filter(|v| !v.is_empty());

    if let Some(v) = read("MIRROR_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read("MIRROR_PORT") {
        match parse_u16_range(&v, 0, 65535) {
            Some(port) => settings.server.port = port,
            None => invalid("MIRROR_PORT", &v),
        }
    }
    if let Some(v) = read("MIRROR_MAX_FPS") {
        match parse_f64_range(&v, MIN_MAX_FPS, MAX_MAX_FPS) {
            Some(fps) => settings.session.max_fps = fps,
            None => invalid("MIRROR_MAX_FPS", &v),
        }
    }
    if let Some(v) = read("MIRROR_DISPOSE_GRAPH") {
        match parse_bool(&v) {
            Some(b) => settings.session.dispose_graph_after_session = b,
            None => invalid("MIRROR_DISPOSE_GRAPH", &v),
        }
    }
    if let Some(v) = read("MIRROR_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

fn invalid(key: &str, value: &str) {
    tracing::warn!(key, value, "invalid env var, ignoring");
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as an `f64` within `min..=max`. NaN is rejected.
pub fn parse_f64_range(val: &str, min: f64, max: f64) -> Option<f64> {
    let n: f64 = val.parse().ok()?;
    (min..=max).contains(&n).then_some(n)
}
