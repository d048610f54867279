use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::ProbeError;
use crate::proxy::ProxyConfig;

pub const DEFAULT_USER_AGENT: &str = concat!("hlsprobe/", env!("CARGO_PKG_VERSION"));

/// HTTP transport options shared by manifest and segment requests.
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Timeout applied to every request, covering connect, headers and body.
    /// Zero disables it and leaves the transport default in place.
    pub timeout: Duration,

    /// Time allowed to establish a connection
    pub connect_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Headers added to every request
    pub headers: HeaderMap,

    /// Proxy configuration (optional)
    pub proxy: Option<ProxyConfig>,

    /// Whether to use system proxy settings if no explicit proxy is set
    pub use_system_proxy: bool,

    /// Maximum idle connections to keep per host
    pub pool_max_idle_per_host: usize,

    /// Duration to keep idle connections alive before closing
    pub pool_idle_timeout: Duration,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: DownloaderConfig::get_default_headers(),
            proxy: None,
            use_system_proxy: true,
            pool_max_idle_per_host: 10,
            pool_idle_timeout: Duration::from_secs(30),
        }
    }
}

impl DownloaderConfig {
    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));
        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );
        default_headers
    }

    /// Adds `key=value` pairs on top of the default headers.
    ///
    /// Later pairs override earlier ones with the same name.
    pub fn with_extra_headers(mut self, pairs: &[(String, String)]) -> Result<Self, ProbeError> {
        for (key, value) in pairs {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                ProbeError::configuration(format!("invalid header name `{key}`: {e}"))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                ProbeError::configuration(format!("invalid value for header `{key}`: {e}"))
            })?;
            self.headers.insert(name, value);
        }
        Ok(self)
    }
}

/// Tunables for one reader. Every reader receives its own copy; nothing here is global.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    pub downloader: DownloaderConfig,

    /// Delay between scheduler scans
    pub scan_interval: Duration,

    /// Fraction of the last segment duration used as the manifest poll interval.
    /// Must be in `(0, 1]`; values near 0.5 poll at least twice per segment.
    pub poll_factor: f64,

    /// Segment duration assumed when the manifest carries no usable `#EXTINF`
    pub fallback_segment_duration: Duration,

    /// Bytes added to every accounted response as an estimate of header size
    pub header_overhead_bytes: u64,

    /// Pause after a failed manifest refresh. Zero retries immediately.
    pub manifest_retry_delay: Duration,

    /// Ceiling on in-flight segment downloads per reader. `None` is unbounded.
    pub max_concurrent_downloads: Option<usize>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            downloader: DownloaderConfig::default(),
            scan_interval: Duration::from_millis(100),
            poll_factor: 0.48,
            fallback_segment_duration: Duration::from_secs(5),
            header_overhead_bytes: 8,
            manifest_retry_delay: Duration::ZERO,
            max_concurrent_downloads: None,
        }
    }
}

impl ProbeConfig {
    /// Rejects values that would stall or spin the loops.
    pub fn validate(&self) -> Result<(), ProbeError> {
        if self.scan_interval.is_zero() {
            return Err(ProbeError::configuration("scan interval must be positive"));
        }
        if !(self.poll_factor > 0.0 && self.poll_factor <= 1.0) {
            return Err(ProbeError::configuration(format!(
                "poll factor must be in (0, 1], got {}",
                self.poll_factor
            )));
        }
        if self.fallback_segment_duration.is_zero() {
            return Err(ProbeError::configuration(
                "fallback segment duration must be positive",
            ));
        }
        if self.max_concurrent_downloads == Some(0) {
            return Err(ProbeError::configuration(
                "download concurrency ceiling must be at least 1",
            ));
        }
        Ok(())
    }

    /// Poll interval derived from a segment duration in seconds.
    ///
    /// A duration too large (or otherwise unrepresentable) for a `Duration`
    /// is replaced by the fallback segment duration.
    pub fn poll_interval_for(&self, segment_duration_secs: f64) -> Duration {
        Duration::try_from_secs_f64(segment_duration_secs * self.poll_factor)
            .or_else(|_| {
                Duration::try_from_secs_f64(
                    self.fallback_segment_duration.as_secs_f64() * self.poll_factor,
                )
            })
            .unwrap_or(self.fallback_segment_duration)
    }
}
