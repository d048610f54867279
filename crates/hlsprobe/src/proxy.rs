use reqwest::Proxy;

use crate::error::ProbeError;

/// Proxy scheme
#[derive(Debug, Clone, PartialEq, Eq, Copy)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum ProxyType {
    Http,
    Https,
    Socks5,
}

#[derive(Debug, Clone)]
pub struct ProxyAuth {
    pub username: String,
    pub password: String,
}

/// Proxy used for both manifest and segment requests.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Proxy server address, with or without scheme
    pub url: String,
    pub proxy_type: ProxyType,
    pub auth: Option<ProxyAuth>,
}

impl ProxyConfig {
    /// Infers the proxy type from the URL scheme; a bare `host:port` is treated as HTTP.
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let proxy_type = if url.starts_with("socks5://") || url.starts_with("socks5h://") {
            ProxyType::Socks5
        } else if url.starts_with("https://") {
            ProxyType::Https
        } else {
            ProxyType::Http
        };
        Self {
            url,
            proxy_type,
            auth: None,
        }
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(ProxyAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    pub(crate) fn build(&self) -> Result<Proxy, ProbeError> {
        let target = match self.proxy_type {
            ProxyType::Socks5 if !self.url.contains("://") => format!("socks5://{}", self.url),
            _ => self.url.clone(),
        };

        let proxy = match self.proxy_type {
            ProxyType::Http => Proxy::http(&target),
            ProxyType::Https => Proxy::https(&target),
            ProxyType::Socks5 => Proxy::all(&target),
        }
        .map_err(|e| ProbeError::proxy_configuration(format!("invalid proxy `{target}`: {e}")))?;

        Ok(match &self.auth {
            Some(auth) => proxy.basic_auth(&auth.username, &auth.password),
            None => proxy,
        })
    }
}
