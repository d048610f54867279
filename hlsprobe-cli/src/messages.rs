//! Text templates for everything the probe prints on stdout.
//!
//! Templates use named `{placeholder}` slots. A catalog file is a JSON object
//! with any subset of the fields below; missing fields keep their English
//! default, so a translation can be partial.

use std::fmt::Display;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Messages {
    pub started: String,
    pub report_header: String,
    pub final_header: String,
    pub reader_header: String,
    pub requests: String,
    pub errors: String,
    pub bytes: String,
    pub speed: String,
    pub speed_unknown: String,
    pub poll_interval: String,
    pub in_flight: String,
    pub playlist_header: String,
    pub segment: String,
    pub loaded: String,
    pub pending_locked: String,
    pub pending_unlocked: String,
    pub interrupted: String,
    pub downloads_pending: String,
    pub done: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            started: "Started {workers} reader(s) for {url}".into(),
            report_header: "=== Report at {time} ===".into(),
            final_header: "=== Final statistics at {time} ===".into(),
            reader_header: "Reader {id} ({state}):".into(),
            requests: "  Requests: {count}".into(),
            errors: "  Errors: {count}".into(),
            bytes: "  Bytes received: {count}".into(),
            speed: "  Speed: {mbps} Mbps".into(),
            speed_unknown: "  Speed: n/a".into(),
            poll_interval: "  Poll interval: {secs}s".into(),
            in_flight: "  Downloads in flight: {count}".into(),
            playlist_header: "  Playlist ({count} segments):".into(),
            segment: "    {name}: {status}".into(),
            loaded: "loaded".into(),
            pending_locked: "downloading".into(),
            pending_unlocked: "pending".into(),
            interrupted: "Interrupted, stopping readers".into(),
            downloads_pending: "Reader {id}: {count} download(s) still in flight".into(),
            done: "Done.".into(),
        }
    }
}

impl Messages {
    /// Loads a catalog from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let messages = serde_json::from_str(&raw).map_err(|e| {
            AppError::Messages(format!("failed to parse {}: {e}", path.display()))
        })?;
        debug!(path = %path.display(), "Loaded message catalog");
        Ok(messages)
    }
}

/// Substitutes every `{key}` in `template`. Unknown placeholders are left as is.
pub fn render(template: &str, args: &[(&str, &dyn Display)]) -> String {
    let mut out = template.to_string();
    for (key, value) in args {
        let slot = format!("{{{key}}}");
        if out.contains(&slot) {
            out = out.replace(&slot, &value.to_string());
        }
    }
    out
}
