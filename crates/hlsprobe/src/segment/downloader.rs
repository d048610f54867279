// Segment Downloader: fetches one segment and settles its flags and statistics.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::client::MediaClient;
use crate::config::ProbeConfig;
use crate::error::FetchError;
use crate::manifest::ManifestState;
use crate::stats::{StatCounters, bitrate_mbps};

use super::resolve::resolve_segment_url;

pub struct SegmentDownloader {
    reader_id: usize,
    client: Arc<dyn MediaClient>,
    manifest: Arc<ManifestState>,
    stats: Arc<StatCounters>,
    config: Arc<ProbeConfig>,
}

impl SegmentDownloader {
    pub fn new(
        reader_id: usize,
        client: Arc<dyn MediaClient>,
        manifest: Arc<ManifestState>,
        stats: Arc<StatCounters>,
        config: Arc<ProbeConfig>,
    ) -> Self {
        Self {
            reader_id,
            client,
            manifest,
            stats,
            config,
        }
    }

    /// Downloads `segment`, which the caller has already locked.
    ///
    /// Success marks it loaded; any failure counts an error and unlocks it for
    /// the next scan. A segment that left the window meanwhile is left alone.
    pub async fn fetch(&self, segment: &str) {
        let started = Instant::now();

        let url = match resolve_segment_url(self.manifest.url(), segment) {
            Ok(url) => url,
            Err(e) => {
                self.fail(segment, &e);
                return;
            }
        };

        debug!(reader = self.reader_id, url = %url, "Requesting segment");

        let body = match self.client.get(&url).await {
            Ok(body) => body,
            Err(e) => {
                self.fail(segment, &e);
                return;
            }
        };

        let elapsed = started.elapsed();
        let size = body.len() as u64 + self.config.header_overhead_bytes;
        self.stats.record_segment(size, elapsed);

        let mbps = bitrate_mbps(size, elapsed).unwrap_or_default();
        debug!(
            reader = self.reader_id,
            url = %url,
            bytes = size,
            elapsed = ?elapsed,
            mbps = %format!("{mbps:.2}"),
            "Segment loaded"
        );

        if !self.manifest.mark_loaded(segment) {
            debug!(reader = self.reader_id, segment, "Loaded segment already left the window");
        }
    }

    fn fail(&self, segment: &str, error: &FetchError) {
        self.stats.record_error();
        warn!(reader = self.reader_id, segment, error = %error, "Segment download failed");
        self.manifest.release(segment);
    }
}
