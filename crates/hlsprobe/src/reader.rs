// Reader: one manifest-consumption session with its own state and statistics.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, info, info_span, warn};
use url::Url;

use crate::client::{HttpClient, MediaClient};
use crate::config::ProbeConfig;
use crate::error::ProbeError;
use crate::manifest::{ManifestFetcher, ManifestState, Segment};
use crate::report::ReaderReport;
use crate::scheduler::SegmentScheduler;
use crate::segment::SegmentDownloader;
use crate::stats::{StatCounters, StatsSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReaderState {
    Initialized,
    Running,
    /// Stop requested; loops exit at their next iteration boundary
    Stopping,
    /// Both loops exited. Dispatched downloads may still be finishing.
    Stopped,
}

impl ReaderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReaderState::Initialized => "initialized",
            ReaderState::Running => "running",
            ReaderState::Stopping => "stopping",
            ReaderState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ReaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Reader {
    id: usize,
    manifest: Arc<ManifestState>,
    stats: Arc<StatCounters>,
    client: Arc<dyn MediaClient>,
    config: Arc<ProbeConfig>,
    token: CancellationToken,
    downloads: TaskTracker,
    state: Mutex<ReaderState>,
    loops: Mutex<Vec<JoinHandle<()>>>,
}

impl Reader {
    /// Creates a reader with its own HTTP client built from `config.downloader`.
    pub fn new(id: usize, manifest_url: &str, config: Arc<ProbeConfig>) -> Result<Self, ProbeError> {
        let client = HttpClient::new(config.downloader.clone())?;
        Self::with_client(id, manifest_url, Arc::new(client), config)
    }

    pub fn with_client(
        id: usize,
        manifest_url: &str,
        client: Arc<dyn MediaClient>,
        config: Arc<ProbeConfig>,
    ) -> Result<Self, ProbeError> {
        config.validate()?;
        let url = Url::parse(manifest_url)
            .map_err(|e| ProbeError::invalid_url(manifest_url, e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ProbeError::invalid_url(
                manifest_url,
                format!("unsupported scheme `{}`", url.scheme()),
            ));
        }

        let initial_interval = config.poll_interval_for(config.fallback_segment_duration.as_secs_f64());
        Ok(Self {
            id,
            manifest: Arc::new(ManifestState::new(url, initial_interval)),
            stats: Arc::new(StatCounters::new()),
            client,
            config,
            token: CancellationToken::new(),
            downloads: TaskTracker::new(),
            state: Mutex::new(ReaderState::Initialized),
            loops: Mutex::new(Vec::new()),
        })
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> ReaderState {
        *self.state.lock()
    }

    /// Starts the manifest refresh loop and the scheduler loop.
    ///
    /// Only has an effect on a reader that has never been started.
    pub fn start(&self) {
        {
            let mut state = self.state.lock();
            if *state != ReaderState::Initialized {
                warn!(reader = self.id, state = ?*state, "Reader already started");
                return;
            }
            *state = ReaderState::Running;
        }

        let span = info_span!("reader", id = self.id);

        let fetcher = ManifestFetcher::new(self.id, Arc::clone(&self.client), Arc::clone(&self.config));
        let refresh = refresh_loop(
            fetcher,
            Arc::clone(&self.manifest),
            Arc::clone(&self.stats),
            self.config.manifest_retry_delay,
            self.token.clone(),
        );

        let downloader = Arc::new(SegmentDownloader::new(
            self.id,
            Arc::clone(&self.client),
            Arc::clone(&self.manifest),
            Arc::clone(&self.stats),
            Arc::clone(&self.config),
        ));
        let scheduler = SegmentScheduler::new(
            self.id,
            Arc::clone(&self.manifest),
            downloader,
            &self.config,
            self.downloads.clone(),
            self.token.clone(),
        );

        let mut loops = self.loops.lock();
        loops.push(tokio::spawn(refresh.instrument(span.clone())));
        loops.push(tokio::spawn(
            async move { scheduler.run().await }.instrument(span),
        ));
        info!(reader = self.id, url = %self.manifest.url(), "Reader started");
    }

    /// Signals both loops to stop. Downloads already dispatched are not cancelled.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        match *state {
            ReaderState::Initialized => *state = ReaderState::Stopped,
            ReaderState::Running => *state = ReaderState::Stopping,
            ReaderState::Stopping | ReaderState::Stopped => return,
        }
        self.token.cancel();
        debug!(reader = self.id, "Stop requested");
    }

    /// Waits for both loops to exit. Call after [`Reader::stop`].
    pub async fn wait(&self) {
        let loops = std::mem::take(&mut *self.loops.lock());
        for handle in loops {
            if let Err(e) = handle.await {
                error!(reader = self.id, error = %e, "Reader loop panicked");
            }
        }

        let mut state = self.state.lock();
        if *state == ReaderState::Stopping {
            *state = ReaderState::Stopped;
            info!(reader = self.id, in_flight = self.downloads.len(), "Reader stopped");
        }
    }

    /// Waits up to `timeout` for dispatched downloads to finish.
    /// Returns `true` if none are left.
    pub async fn wait_for_downloads(&self, timeout: Duration) -> bool {
        self.downloads.close();
        let drained = tokio::time::timeout(timeout, self.downloads.wait())
            .await
            .is_ok();
        if !drained {
            debug!(reader = self.id, in_flight = self.downloads.len(), "Downloads still in flight");
        }
        drained
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn segments(&self) -> Vec<Segment> {
        self.manifest.segments()
    }

    pub fn poll_interval(&self) -> Duration {
        self.manifest.poll_interval()
    }

    /// Dispatched downloads that have not finished yet
    pub fn in_flight(&self) -> usize {
        self.downloads.len()
    }

    pub fn report(&self) -> ReaderReport {
        ReaderReport::new(
            self.id,
            self.state(),
            self.poll_interval(),
            self.in_flight(),
            self.stats(),
            &self.segments(),
        )
    }

    pub fn log_summary(&self) {
        self.stats.log_summary(self.id);
    }
}

impl Drop for Reader {
    /// Ends both loops; dispatched downloads still finish on their own.
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Refreshes the manifest until cancelled.
///
/// Sleeps for the poll interval after a successful refresh, and for
/// `retry_delay` after a failed one.
async fn refresh_loop(
    fetcher: ManifestFetcher,
    manifest: Arc<ManifestState>,
    stats: Arc<StatCounters>,
    retry_delay: Duration,
    token: CancellationToken,
) {
    while !token.is_cancelled() {
        let delay = match fetcher.refresh(&manifest, &stats).await {
            Ok(_) => manifest.poll_interval(),
            Err(_) => retry_delay,
        };

        if delay.is_zero() {
            tokio::task::yield_now().await;
            continue;
        }

        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }
    debug!("Manifest refresh loop finished.");
}
