//! Document fetching over HTTP and from local files.
//!
//! [`Fetcher`] wraps one reqwest client bound to a base URL. Every request
//! path is resolved against that base, so callers pass site-relative paths
//! like `/problems/two-sum` the way they appear in scraped `href`s.
//!
//! Failures are mapped onto the transient half of [`GleanError`]:
//! timeouts, transport errors, and non-success statuses are all retried by
//! [`RetryPolicy`](crate::RetryPolicy).

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{GleanError, Result};

/// HTTP client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Base URL that request paths are resolved against.
    pub base_url: Option<String>,
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Custom User-Agent string.
    pub user_agent: String,
    /// Extra headers sent with every request (cookies, auth tokens).
    pub headers: HashMap<String, String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: 30,
            user_agent: "Mozilla/5.0 (compatible; glean/0.1; +https://github.com/glean-rs/glean)".to_string(),
            headers: HashMap::new(),
        }
    }
}

impl FetchConfig {
    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.to_string());
        self
    }

    /// Sets the timeout in seconds.
    #[must_use]
    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    /// Adds a header sent with every request.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_string(), value.to_string());
        self
    }
}

/// HTTP client bound to a base URL.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    base: Option<Url>,
    timeout: u64,
}

impl Fetcher {
    /// Builds the underlying client.
    ///
    /// # Errors
    ///
    /// Returns [`GleanError::InvalidUrl`] for a malformed base URL and
    /// [`GleanError::ConfigError`] for headers that are not valid HTTP.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let base = config.base_url.as_deref().map(parse_url).transpose()?;

        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(reqwest::header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| GleanError::ConfigError(format!("invalid header name `{name}`: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| GleanError::ConfigError(format!("invalid value for header `{name}`: {e}")))?;
            headers.insert(name, value);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .build()?;

        Ok(Self { client, base, timeout: config.timeout })
    }

    /// Resolves `path` against the base URL.
    ///
    /// Absolute URLs are used as they are.
    pub fn url(&self, path: &str) -> Result<Url> {
        match &self.base {
            Some(base) => base.join(path).map_err(|e| GleanError::InvalidUrl(format!("{path}: {e}"))),
            None => parse_url(path),
        }
    }

    /// GETs `path` and returns the body as text.
    pub async fn get_text(&self, path: &str) -> Result<String> {
        let url = self.url(path)?;
        let response = self.send(self.client.get(url.clone()), &url).await?;
        response.text().await.map_err(|e| self.transport_error(e))
    }

    /// GETs `path` and returns the raw body.
    pub async fn get_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let url = self.url(path)?;
        let response = self.send(self.client.get(url.clone()), &url).await?;
        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        Ok(body.to_vec())
    }

    /// GETs `path` and decodes the body as JSON.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        let response = self.send(self.client.get(url.clone()), &url).await?;
        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// POSTs `body` as JSON to `path` and decodes the JSON answer.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path)?;
        let response = self.send(self.client.post(url.clone()).json(body), &url).await?;
        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn send(&self, request: RequestBuilder, url: &Url) -> Result<Response> {
        tracing::debug!(%url, "sending request");

        let response = request.send().await.map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GleanError::Status { status: status.as_u16(), url: url.to_string() });
        }

        Ok(response)
    }

    /// Timeouts while sending or reading a body both become `Timeout`.
    fn transport_error(&self, err: reqwest::Error) -> GleanError {
        if err.is_timeout() { GleanError::Timeout { timeout: self.timeout } } else { GleanError::Http(err) }
    }
}

fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| GleanError::InvalidUrl(format!("{url}: {e}")))
}

/// Reads a document body from a local file.
///
/// Callers should validate and sanitize the path when accepting user input.
pub fn fetch_file(path: &str) -> Result<String> {
    let path_buf = PathBuf::from(path);

    if !path_buf.exists() {
        Err(GleanError::FileNotFound(path_buf))
    } else {
        fs::read_to_string(&path_buf).map_err(GleanError::from)
    }
}
