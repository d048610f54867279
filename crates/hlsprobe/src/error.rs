use reqwest::StatusCode;

/// Failure of a single manifest or segment request.
///
/// Every variant is absorbed into the reader's `errors` counter by the caller;
/// none of them stops a reader.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    #[error("request to {url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },

    #[error("failed to read response body from {url}: {reason}")]
    Body { url: String, reason: String },

    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },
}

impl FetchError {
    pub fn network(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn status(url: impl Into<String>, status: StatusCode) -> Self {
        Self::Status {
            url: url.into(),
            status,
        }
    }

    pub fn body(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Body {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_url(input: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.to_string(),
        }
    }

    /// HTTP status of a `Status` error.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    pub fn is_body(&self) -> bool {
        matches!(self, Self::Body { .. })
    }
}

/// Errors raised while building a probe, before any loop runs.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("invalid manifest URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("HTTP client error: {source}")]
    Client {
        #[from]
        source: reqwest::Error,
    },

    #[error("proxy configuration error: {reason}")]
    ProxyConfiguration { reason: String },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },
}

impl ProbeError {
    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn proxy_configuration(reason: impl Into<String>) -> Self {
        Self::ProxyConfiguration {
            reason: reason.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }
}
