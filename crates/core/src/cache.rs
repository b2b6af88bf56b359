//! Provider-backed fallback in front of an expensive async operation.
//!
//! A [`FallbackCache`] pairs a live operation (usually a network fetch)
//! with an ordered list of synchronous [`Providers`]. Each call asks the
//! providers first and only runs the live operation when every provider
//! misses. Seeding providers from a previous run's output lets a second run
//! fetch only what the first one did not already have.
//!
//! Providers are registered through `&mut self`, so once the cache is
//! shared by reference among concurrent calls the borrow checker rules out
//! further registration.
//!
//! # Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use glean_core::{FallbackCache, GleanError};
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! let mut cache = FallbackCache::new(|slug: String| async move { Ok::<_, GleanError>(format!("fetched {slug}")) });
//! cache.add_map(HashMap::from([("two-sum".to_string(), "cached".to_string())]));
//!
//! assert_eq!(cache.call("two-sum".to_string()).await.unwrap(), "cached");
//! assert_eq!(cache.call("add-two".to_string()).await.unwrap(), "fetched add-two");
//! # });
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;

use crate::Result;

type Provider<K, V> = Box<dyn Fn(&K) -> Option<V> + Send + Sync>;

/// Ordered list of synchronous lookups. `None` means a miss.
pub struct Providers<K, V> {
    providers: Vec<Provider<K, V>>,
}

impl<K, V> Providers<K, V> {
    pub fn new() -> Self {
        Self { providers: Vec::new() }
    }

    /// Appends a provider. Providers are consulted in registration order.
    pub fn push<P>(&mut self, provider: P)
    where
        P: Fn(&K) -> Option<V> + Send + Sync + 'static,
    {
        self.providers.push(Box::new(provider));
    }

    /// Returns the first hit, if any.
    pub fn lookup(&self, key: &K) -> Option<V> {
        self.providers.iter().find_map(|provider| provider(key))
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl<K, V> Providers<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Appends a provider serving the entries of `map`.
    pub fn push_map(&mut self, map: HashMap<K, V>) {
        self.push(move |key| map.get(key).cloned());
    }
}

impl<K, V> Default for Providers<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for Providers<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Providers").field("len", &self.providers.len()).finish()
    }
}

/// A live async operation behind a list of providers.
pub struct FallbackCache<K, V, F> {
    providers: Providers<K, V>,
    fetch: F,
}

impl<K, V, F, Fut> FallbackCache<K, V, F>
where
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<V>>,
{
    /// Wraps `fetch` with an empty provider list.
    pub fn new(fetch: F) -> Self {
        Self { providers: Providers::new(), fetch }
    }

    /// Wraps `fetch` with a provider list built elsewhere.
    pub fn with_providers(providers: Providers<K, V>, fetch: F) -> Self {
        Self { providers, fetch }
    }

    /// Registers a provider. Only possible while the cache is exclusively owned.
    pub fn add_provider<P>(&mut self, provider: P)
    where
        P: Fn(&K) -> Option<V> + Send + Sync + 'static,
    {
        self.providers.push(provider);
    }

    pub fn providers(&self) -> &Providers<K, V> {
        &self.providers
    }

    /// Returns a provider's value for `key`, or runs the live operation.
    ///
    /// The live result is not fed back into the providers: every call makes
    /// its own decision.
    pub async fn call(&self, key: K) -> Result<V> {
        if let Some(value) = self.providers.lookup(&key) {
            tracing::trace!("fallback cache hit");
            return Ok(value);
        }

        tracing::trace!("fallback cache miss, running live operation");
        (self.fetch)(key).await
    }
}

impl<K, V, F, Fut> FallbackCache<K, V, F>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<V>>,
{
    /// Registers a provider serving the entries of `map`.
    pub fn add_map(&mut self, map: HashMap<K, V>) {
        self.providers.push_map(map);
    }
}

impl<K, V, F> fmt::Debug for FallbackCache<K, V, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackCache").field("providers", &self.providers).finish_non_exhaustive()
    }
}
