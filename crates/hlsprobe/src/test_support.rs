// Scripted in-memory transport for unit tests.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::StatusCode;
use url::Url;

use crate::client::MediaClient;
use crate::error::FetchError;

#[derive(Debug, Clone)]
enum Scripted {
    Body(Bytes),
    Status(StatusCode),
    Network,
    BodyError,
}

/// Answers per URL from a queue; the last entry of a queue repeats forever.
/// URLs without a script answer 404.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    requests: Mutex<HashMap<String, usize>>,
    delay: Mutex<Duration>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, url: &str, entry: Scripted) {
        self.scripts
            .lock()
            .entry(url.to_string())
            .or_default()
            .push_back(entry);
    }

    pub fn respond(&self, url: &str, body: impl Into<Bytes>) {
        self.push(url, Scripted::Body(body.into()));
    }

    pub fn fail_status(&self, url: &str, status: StatusCode) {
        self.push(url, Scripted::Status(status));
    }

    pub fn fail_network(&self, url: &str) {
        self.push(url, Scripted::Network);
    }

    pub fn fail_body(&self, url: &str) {
        self.push(url, Scripted::BodyError);
    }

    /// Every response is held back this long
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn requests(&self, url: &str) -> usize {
        self.requests.lock().get(url).copied().unwrap_or(0)
    }

    fn next(&self, url: &str) -> Option<Scripted> {
        let mut scripts = self.scripts.lock();
        let queue = scripts.get_mut(url)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl MediaClient for ScriptedClient {
    async fn get(&self, url: &Url) -> Result<Bytes, FetchError> {
        *self.requests.lock().entry(url.to_string()).or_default() += 1;

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match self.next(url.as_str()) {
            Some(Scripted::Body(body)) => Ok(body),
            Some(Scripted::Status(status)) => Err(FetchError::status(url.as_str(), status)),
            Some(Scripted::Network) => Err(FetchError::network(url.as_str(), "connection refused")),
            Some(Scripted::BodyError) => Err(FetchError::body(url.as_str(), "connection reset")),
            None => Err(FetchError::status(url.as_str(), StatusCode::NOT_FOUND)),
        }
    }
}
