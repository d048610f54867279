// Manifest refresh: fetch, parse, merge, recompute the poll interval.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::client::MediaClient;
use crate::config::ProbeConfig;
use crate::error::FetchError;
use crate::stats::StatCounters;

use super::parser::parse_manifest;
use super::state::{ManifestState, MergeOutcome};

pub struct ManifestFetcher {
    reader_id: usize,
    client: Arc<dyn MediaClient>,
    config: Arc<ProbeConfig>,
}

impl ManifestFetcher {
    pub fn new(reader_id: usize, client: Arc<dyn MediaClient>, config: Arc<ProbeConfig>) -> Self {
        Self {
            reader_id,
            client,
            config,
        }
    }

    /// Runs one refresh cycle against `state`.
    ///
    /// Any request failure counts one error and leaves the segment list and
    /// poll interval untouched.
    pub async fn refresh(
        &self,
        state: &ManifestState,
        stats: &StatCounters,
    ) -> Result<MergeOutcome, FetchError> {
        debug!(reader = self.reader_id, url = %state.url(), "Reloading manifest");

        let body = match self.client.get(state.url()).await {
            Ok(body) => body,
            Err(e) => {
                stats.record_error();
                warn!(reader = self.reader_id, error = %e, "Manifest refresh failed");
                return Err(e);
            }
        };

        let text = String::from_utf8_lossy(&body);
        let parsed = parse_manifest(&text);

        let segment_duration = match parsed.last_duration {
            Some(secs) => secs,
            None => {
                let fallback = self.config.fallback_segment_duration.as_secs_f64();
                trace!(
                    reader = self.reader_id,
                    fallback_secs = fallback,
                    "No usable #EXTINF, using fallback segment duration"
                );
                fallback
            }
        };
        let poll_interval = self.config.poll_interval_for(segment_duration);

        let outcome = state.apply(&parsed, poll_interval);
        stats.record_manifest(body.len() as u64 + self.config.header_overhead_bytes);

        debug!(
            reader = self.reader_id,
            added = outcome.added,
            removed = outcome.removed,
            total = outcome.total,
            poll_interval = ?poll_interval,
            "Manifest merged"
        );

        Ok(outcome)
    }
}
