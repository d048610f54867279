use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum, value_parser};
use hlsprobe_engine::{DownloaderConfig, ProbeConfig, ProxyConfig, ProxyType};
use url::Url;

use crate::error::Result;
use crate::utils::parse_params;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text built from the message catalog
    Pretty,
    /// One JSON document per report
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "hlsprobe",
    version,
    about = "Consumes a live HLS stream with many independent readers and reports throughput",
    long_about = None
)]
pub struct Args {
    /// Number of independent readers
    #[arg(short = 'w', long, default_value_t = 1, value_parser = value_parser!(u32).range(1..))]
    pub workers: u32,

    /// Seconds between statistics reports
    #[arg(short = 'r', long = "report-period", default_value_t = 10, value_parser = value_parser!(u64).range(1..))]
    pub report_period: u64,

    /// Seconds to run before stopping all readers
    #[arg(short = 't', long = "time", default_value_t = 60)]
    pub run_time: u64,

    /// Media manifest URL
    #[arg(short = 'u', long, value_parser = parse_manifest_url)]
    pub url: Url,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 10, value_parser = value_parser!(u64).range(1..))]
    pub timeout: u64,

    /// Connect timeout in seconds
    #[arg(long = "connect-timeout", default_value_t = 5, value_parser = value_parser!(u64).range(1..))]
    pub connect_timeout: u64,

    /// Maximum concurrent segment downloads per reader (unbounded if omitted)
    #[arg(long = "max-concurrent", value_parser = value_parser!(u64).range(1..))]
    pub max_concurrent: Option<u64>,

    /// Delay in milliseconds before retrying a failed manifest fetch
    #[arg(long = "retry-delay-ms", default_value_t = 0)]
    pub retry_delay_ms: u64,

    /// Seconds to wait for in-flight downloads after stopping
    #[arg(long = "drain-timeout")]
    pub drain_timeout: Option<u64>,

    /// Extra request header, repeatable
    #[arg(short = 'H', long = "header", value_name = "KEY=VALUE")]
    pub headers: Vec<String>,

    /// Override the User-Agent header
    #[arg(long = "user-agent")]
    pub user_agent: Option<String>,

    /// Proxy server URL
    #[arg(long)]
    pub proxy: Option<String>,

    /// Proxy type; inferred from the proxy URL when omitted
    #[arg(long = "proxy-type", value_enum, requires = "proxy")]
    pub proxy_type: Option<ProxyType>,

    #[arg(long = "proxy-user", requires = "proxy", requires = "proxy_password")]
    pub proxy_user: Option<String>,

    #[arg(long = "proxy-password", requires = "proxy_user")]
    pub proxy_password: Option<String>,

    /// Ignore proxy settings from the environment
    #[arg(long = "no-system-proxy")]
    pub no_system_proxy: bool,

    /// JSON message catalog overriding the built-in texts
    #[arg(long)]
    pub messages: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
    pub format: OutputFormat,

    /// Omit per-segment lines from reports
    #[arg(long = "hide-segments")]
    pub hide_segments: bool,

    /// Enable debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Builds the per-reader configuration from the flags.
    pub fn probe_config(&self) -> Result<ProbeConfig> {
        let headers = parse_params(&self.headers)?;

        let mut downloader = DownloaderConfig {
            timeout: Duration::from_secs(self.timeout),
            connect_timeout: Duration::from_secs(self.connect_timeout),
            use_system_proxy: !self.no_system_proxy,
            ..Default::default()
        }
        .with_extra_headers(&headers)?;

        if let Some(user_agent) = &self.user_agent {
            downloader.user_agent = user_agent.clone();
        }

        if let Some(proxy) = &self.proxy {
            let mut proxy_config = ProxyConfig::from_url(proxy.clone());
            if let Some(proxy_type) = self.proxy_type {
                proxy_config.proxy_type = proxy_type;
            }
            if let (Some(user), Some(password)) = (&self.proxy_user, &self.proxy_password) {
                proxy_config = proxy_config.with_auth(user.clone(), password.clone());
            }
            downloader.proxy = Some(proxy_config);
        }

        let config = ProbeConfig {
            downloader,
            manifest_retry_delay: Duration::from_millis(self.retry_delay_ms),
            max_concurrent_downloads: self.max_concurrent.map(|n| n as usize),
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn run_time(&self) -> Duration {
        Duration::from_secs(self.run_time)
    }

    pub fn report_period(&self) -> Duration {
        Duration::from_secs(self.report_period)
    }

    pub fn drain_timeout(&self) -> Option<Duration> {
        self.drain_timeout.map(Duration::from_secs)
    }
}

fn parse_manifest_url(input: &str) -> std::result::Result<Url, String> {
    let url = Url::parse(input).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("unsupported scheme `{other}`, expected http or https")),
    }
}
