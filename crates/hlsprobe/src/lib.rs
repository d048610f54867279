//! Engine for probing live HLS streams.
//!
//! A [`Reader`] polls one media manifest, keeps the window of segments it
//! lists, downloads every new segment exactly once and aggregates request
//! statistics. Many readers can run side by side; they share nothing.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use hlsprobe_engine::{ProbeConfig, Reader};
//!
//! # async fn run() -> Result<(), hlsprobe_engine::ProbeError> {
//! let reader = Reader::new(0, "https://example.com/live/index.m3u8", Arc::new(ProbeConfig::default()))?;
//! reader.start();
//! tokio::time::sleep(Duration::from_secs(30)).await;
//! reader.stop();
//! reader.wait().await;
//! println!("{:?}", reader.report());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod manifest;
pub mod proxy;
pub mod reader;
pub mod report;
pub mod scheduler;
pub mod segment;
pub mod stats;

#[cfg(test)]
mod test_support;

pub use client::{HttpClient, MediaClient, create_client};
pub use config::{DownloaderConfig, ProbeConfig};
pub use error::{FetchError, ProbeError};
pub use manifest::{ManifestFetcher, ManifestState, Segment};
pub use proxy::{ProxyConfig, ProxyType};
pub use reader::{Reader, ReaderState};
pub use report::{ReaderReport, SegmentReport, SegmentStatus};
pub use scheduler::SegmentScheduler;
pub use segment::SegmentDownloader;
pub use stats::{StatCounters, StatsSnapshot};
