// HTTP transport used by the manifest fetcher and the segment downloader.

use std::sync::OnceLock;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, info, trace};
use url::Url;

use crate::config::DownloaderConfig;
use crate::error::{FetchError, ProbeError};

/// One GET request resolved to its full body.
///
/// Implementations must check, in order: transport success (`Network`),
/// a 2xx status (`Status`), then the body read (`Body`).
#[async_trait]
pub trait MediaClient: Send + Sync {
    async fn get(&self, url: &Url) -> Result<Bytes, FetchError>;
}

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Create a reqwest Client with the provided configuration
pub fn create_client(config: &DownloaderConfig) -> Result<Client, ProbeError> {
    install_rustls_provider();

    let mut client_builder = Client::builder()
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .pool_idle_timeout(config.pool_idle_timeout)
        .user_agent(&config.user_agent)
        .default_headers(config.headers.clone())
        .redirect(if config.follow_redirects {
            reqwest::redirect::Policy::limited(10)
        } else {
            reqwest::redirect::Policy::none()
        });

    if !config.connect_timeout.is_zero() {
        client_builder = client_builder.connect_timeout(config.connect_timeout);
    }

    if let Some(proxy_config) = &config.proxy {
        client_builder = client_builder.proxy(proxy_config.build()?);
        info!(proxy_url = %proxy_config.url, "Using explicitly configured proxy");
    } else if !config.use_system_proxy {
        client_builder = client_builder.no_proxy();
        debug!("Proxy disabled");
    }

    client_builder.build().map_err(ProbeError::from)
}

/// [`MediaClient`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    config: DownloaderConfig,
}

impl HttpClient {
    pub fn new(config: DownloaderConfig) -> Result<Self, ProbeError> {
        let inner = create_client(&config)?;
        Ok(Self { inner, config })
    }

    /// Wraps an existing client; `config` only supplies the per-request timeout.
    pub fn with_client(inner: Client, config: DownloaderConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl MediaClient for HttpClient {
    async fn get(&self, url: &Url) -> Result<Bytes, FetchError> {
        let mut request = self.inner.get(url.clone());
        if !self.config.timeout.is_zero() {
            request = request.timeout(self.config.timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::network(url.as_str(), describe(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::status(url.as_str(), status));
        }

        trace!(url = %url, http_version = ?response.version(), "Response headers received");

        response
            .bytes()
            .await
            .map_err(|e| FetchError::body(url.as_str(), describe(&e)))
    }
}

fn describe(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("timed out: {e}")
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        e.to_string()
    }
}
