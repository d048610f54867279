use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tracing::info;

/// Aggregate request statistics for one reader.
///
/// Shared by the refresh loop and every download task. Each counter is its own
/// atomic, so increments from concurrent tasks are never lost; the counters are
/// only ever added to.
#[derive(Debug, Default)]
pub struct StatCounters {
    /// Completed requests (manifest refreshes and segment downloads)
    connections: AtomicU64,
    /// Accounted bytes, body plus header overhead estimate
    bytes_received: AtomicU64,
    /// Failed requests of any kind
    errors: AtomicU64,
    /// Sum of segment transfer times in microseconds
    transfer_micros: AtomicU64,
}

impl StatCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful manifest refresh. Manifest time is not part of the transfer total.
    pub fn record_manifest(&self, bytes: u64) {
        self.connections.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record a successful segment download
    pub fn record_segment(&self, bytes: u64, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.connections.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes, Ordering::Relaxed);
        self.transfer_micros.fetch_add(micros, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connections: self.connections.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            transfer_duration: Duration::from_micros(self.transfer_micros.load(Ordering::Relaxed)),
        }
    }

    /// Log the current totals using tracing
    pub fn log_summary(&self, reader_id: usize) {
        let snapshot = self.snapshot();
        let bitrate = snapshot
            .effective_bitrate_mbps()
            .map(|mbps| format!("{mbps:.2} Mbps"))
            .unwrap_or_else(|| "N/A".to_string());

        info!(
            reader = reader_id,
            connections = snapshot.connections,
            bytes_received = snapshot.bytes_received,
            errors = snapshot.errors,
            transfer_duration = ?snapshot.transfer_duration,
            bitrate = %bitrate,
            "Reader statistics"
        );
    }
}

/// A point-in-time copy of [`StatCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub connections: u64,
    pub bytes_received: u64,
    pub errors: u64,
    #[serde(serialize_with = "serialize_secs")]
    pub transfer_duration: Duration,
}

impl StatsSnapshot {
    /// Throughput over segment transfer time in Mbps (2^20 bits per second).
    ///
    /// Returns `None` until some transfer time has been recorded.
    pub fn effective_bitrate_mbps(&self) -> Option<f64> {
        bitrate_mbps(self.bytes_received, self.transfer_duration)
    }
}

/// `bytes * 8 / seconds / 2^20`, or `None` for a zero duration.
pub fn bitrate_mbps(bytes: u64, elapsed: Duration) -> Option<f64> {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return None;
    }
    Some(bytes as f64 * 8.0 / secs / (1024.0 * 1024.0))
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}
