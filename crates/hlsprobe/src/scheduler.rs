// Segment Scheduler: periodically dispatches a download for every pending segment.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace};

use crate::config::ProbeConfig;
use crate::manifest::ManifestState;
use crate::segment::SegmentDownloader;

pub struct SegmentScheduler {
    reader_id: usize,
    manifest: Arc<ManifestState>,
    downloader: Arc<SegmentDownloader>,
    /// Present when a download concurrency ceiling is configured
    limiter: Option<Arc<Semaphore>>,
    /// Dispatched downloads; they outlive the scan loop
    downloads: TaskTracker,
    scan_interval: Duration,
    token: CancellationToken,
}

impl SegmentScheduler {
    pub fn new(
        reader_id: usize,
        manifest: Arc<ManifestState>,
        downloader: Arc<SegmentDownloader>,
        config: &ProbeConfig,
        downloads: TaskTracker,
        token: CancellationToken,
    ) -> Self {
        Self {
            reader_id,
            manifest,
            downloader,
            limiter: config
                .max_concurrent_downloads
                .map(|limit| Arc::new(Semaphore::new(limit))),
            downloads,
            scan_interval: config.scan_interval,
            token,
        }
    }

    /// Locks every pending segment (up to the free concurrency slots) and
    /// spawns one download per locked segment. Returns the number dispatched.
    ///
    /// Never waits for the downloads it starts.
    pub fn scan_once(&self) -> usize {
        let limit = self
            .limiter
            .as_ref()
            .map_or(usize::MAX, |limiter| limiter.available_permits());
        if limit == 0 {
            trace!(reader = self.reader_id, "All download slots busy");
            return 0;
        }

        let mut dispatched = 0;
        for segment in self.manifest.claim_pending(limit) {
            let permit = match &self.limiter {
                Some(limiter) => match Arc::clone(limiter).try_acquire_owned() {
                    Ok(permit) => Some(permit),
                    Err(_) => {
                        // Keep "locked" meaning "in flight".
                        self.manifest.release(&segment);
                        continue;
                    }
                },
                None => None,
            };

            let downloader = Arc::clone(&self.downloader);
            self.downloads.spawn(async move {
                downloader.fetch(&segment).await;
                drop(permit);
            });
            dispatched += 1;
        }

        if dispatched > 0 {
            debug!(
                reader = self.reader_id,
                dispatched,
                in_flight = self.downloads.len(),
                "Dispatched segment downloads"
            );
        }
        dispatched
    }

    /// Scans every `scan_interval` until the token is cancelled.
    pub async fn run(&self) {
        info!(reader = self.reader_id, "SegmentScheduler started.");
        while !self.token.is_cancelled() {
            self.scan_once();

            tokio::select! {
                biased;
                _ = self.token.cancelled() => break,
                _ = tokio::time::sleep(self.scan_interval) => {}
            }
        }
        info!(
            reader = self.reader_id,
            in_flight = self.downloads.len(),
            "SegmentScheduler finished."
        );
    }
}
