//! Fetch orchestration.
//!
//! [`Harvester`] drives repeated fetches against the extraction engine:
//! every request is wrapped in the configured [`RetryPolicy`], every body is
//! resolved into a typed [`Page`], and batches of requests run through
//! [`for_each_chunked`] so no more than `chunk_size` are in flight.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use glean_core::{Extract, HarvestConfig, Harvester, Page, Record, Result, Schema, SchemaCell};
//!
//! struct Problem {
//!     title: String,
//! }
//!
//! impl Page for Problem {
//!     fn schema() -> Result<Arc<Schema>> {
//!         static SCHEMA: SchemaCell = SchemaCell::new();
//!         SCHEMA.get_or_try_init(|| Schema::builder("problem").field("title", Extract::one("h1")?.text()).build())
//!     }
//!
//!     fn from_record(mut record: Record) -> Result<Self> {
//!         Ok(Self { title: record.take_text("title")? })
//!     }
//! }
//!
//! # async fn run() -> Result<()> {
//! let config = HarvestConfig::builder().base_url("https://example.com").chunk_size(5).build();
//! let harvester = Harvester::new(config)?;
//!
//! let paths = vec!["/problems/1".to_string(), "/problems/2".to_string()];
//! let problems: Vec<Problem> = harvester.fetch_pages(paths).await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::fetch::{FetchConfig, Fetcher};
use crate::record::Record;
use crate::retry::RetryPolicy;
use crate::schedule::{collect_pages, for_each_chunked};
use crate::schema::{Page, Schema};
use crate::{Document, Result};

/// Configuration for a [`Harvester`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// HTTP client settings.
    pub fetch: FetchConfig,
    /// Retry policy applied to every request.
    pub retry: RetryPolicy,
    /// Maximum concurrent requests per chunk (default: 10).
    pub chunk_size: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self { fetch: FetchConfig::default(), retry: RetryPolicy::default(), chunk_size: 10 }
    }
}

impl HarvestConfig {
    /// Creates a new builder for HarvestConfig.
    pub fn builder() -> HarvestConfigBuilder {
        HarvestConfigBuilder::new()
    }
}

/// Builder for HarvestConfig.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use glean_core::HarvestConfig;
///
/// let config = HarvestConfig::builder()
///     .base_url("https://leetcode.com")
///     .header("Cookie", "LEETCODE_SESSION=abc")
///     .max_attempts(3)
///     .delay_range(Duration::ZERO, Duration::from_millis(500))
///     .chunk_size(10)
///     .build();
/// assert_eq!(config.retry.max_attempts, 3);
/// ```
pub struct HarvestConfigBuilder {
    config: HarvestConfig,
}

impl HarvestConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self { config: HarvestConfig::default() }
    }

    /// Sets the base URL request paths are resolved against.
    pub fn base_url(mut self, value: &str) -> Self {
        self.config.fetch.base_url = Some(value.to_string());
        self
    }

    /// Sets the request timeout in seconds.
    pub fn timeout(mut self, value: u64) -> Self {
        self.config.fetch.timeout = value;
        self
    }

    /// Sets the User-Agent.
    pub fn user_agent(mut self, value: &str) -> Self {
        self.config.fetch.user_agent = value.to_string();
        self
    }

    /// Adds a header sent with every request.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.config.fetch.headers.insert(name.to_string(), value.to_string());
        self
    }

    /// Replaces the retry policy.
    pub fn retry(mut self, value: RetryPolicy) -> Self {
        self.config.retry = value;
        self
    }

    /// Sets the maximum attempts per request.
    pub fn max_attempts(mut self, value: usize) -> Self {
        self.config.retry.max_attempts = value;
        self
    }

    /// Sets the range retry delays are drawn from.
    pub fn delay_range(mut self, min: Duration, max: Duration) -> Self {
        self.config.retry.min_delay = min;
        self.config.retry.max_delay = max;
        self
    }

    /// Sets the number of concurrent requests per chunk.
    pub fn chunk_size(mut self, value: usize) -> Self {
        self.config.chunk_size = value;
        self
    }

    /// Builds the HarvestConfig.
    pub fn build(self) -> HarvestConfig {
        self.config
    }
}

impl Default for HarvestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Retried, chunked fetching of typed pages.
#[derive(Debug, Clone)]
pub struct Harvester {
    fetcher: Fetcher,
    retry: RetryPolicy,
    chunk_size: usize,
}

impl Harvester {
    /// Builds the HTTP client described by `config`.
    pub fn new(config: HarvestConfig) -> Result<Self> {
        let fetcher = Fetcher::new(&config.fetch)?;
        Ok(Self { fetcher, retry: config.retry, chunk_size: config.chunk_size })
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Fetches `path` and resolves it as `P`.
    ///
    /// Network failures are retried; a body that does not match `P`'s
    /// schema fails at once.
    pub async fn fetch_page<P: Page>(&self, path: &str) -> Result<P> {
        self.retry
            .run(move || async move {
                let body = self.fetcher.get_bytes(path).await?;
                P::parse_bytes(&body)
            })
            .await
    }

    /// Fetches `path` and resolves it against an ad-hoc schema.
    pub async fn fetch_record(&self, path: &str, schema: &Schema) -> Result<Record> {
        self.retry
            .run(move || async move {
                let body = self.fetcher.get_bytes(path).await?;
                let doc = Document::from_bytes(&body);
                schema.resolve(doc.root())
            })
            .await
    }

    /// Fetches and decodes a JSON document.
    pub async fn fetch_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.retry.run(move || async move { self.fetcher.get_json(path).await }).await
    }

    /// Fetches every path as `P`, `chunk_size` at a time, in input order.
    pub async fn fetch_pages<P: Page>(&self, paths: Vec<String>) -> Result<Vec<P>> {
        tracing::info!(pages = paths.len(), chunk_size = self.chunk_size, "fetching pages");
        for_each_chunked(paths, self.chunk_size, move |path| async move { self.fetch_page::<P>(&path).await }).await
    }

    /// Runs `f` over `items` with this harvester's chunk size.
    pub async fn for_each<T, R, F, Fut>(&self, items: Vec<T>, f: F) -> Result<Vec<R>>
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        for_each_chunked(items, self.chunk_size, f).await
    }

    /// Walks a paginated listing until an empty page.
    ///
    /// `page_path` maps a page number to its path, `items` pulls the
    /// listed entries out of a resolved page, and `key` identifies entries
    /// for de-duplication.
    pub async fn fetch_listing<P, T, K, PF, IF, KF>(&self, page_path: PF, items: IF, key: KF) -> Result<Vec<T>>
    where
        P: Page,
        PF: Fn(usize) -> String,
        IF: Fn(P) -> Vec<T>,
        KF: Fn(&T) -> K,
        K: Eq + Hash,
    {
        let page_path = &page_path;
        let items = &items;
        collect_pages(
            self.chunk_size,
            move |page| async move { self.fetch_page::<P>(&page_path(page)).await.map(items) },
            key,
        )
        .await
    }
}
