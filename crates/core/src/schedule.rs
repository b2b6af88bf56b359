//! Chunked bounded concurrency.
//!
//! Work is split into consecutive chunks; every item of a chunk runs
//! concurrently, and the next chunk starts only after the whole current
//! chunk has finished. At most `chunk_size` operations are ever in flight,
//! which doubles as a crude rate limit against the remote service.

use std::collections::HashSet;
use std::future::Future;
use std::hash::Hash;

use futures::future::join_all;

use crate::{GleanError, Result};

/// Runs `f` over `items` in sequential chunks of concurrent calls.
///
/// Results come back in the order of `items`. If any call in a chunk
/// fails, the rest of that chunk still runs to completion, no later chunk
/// is started, and the first failure in item order is returned.
///
/// # Errors
///
/// Returns [`GleanError::ConfigError`] if `chunk_size` is zero.
///
/// # Example
///
/// ```rust
/// use glean_core::{GleanError, for_each_chunked};
///
/// # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
/// # rt.block_on(async {
/// let doubled = for_each_chunked((1..=5).collect::<Vec<_>>(), 2, |n| async move { Ok::<_, GleanError>(n * 2) })
///     .await
///     .unwrap();
/// assert_eq!(doubled, vec![2, 4, 6, 8, 10]);
/// # });
/// ```
pub async fn for_each_chunked<T, R, F, Fut>(items: Vec<T>, chunk_size: usize, mut f: F) -> Result<Vec<R>>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<R>>,
{
    if chunk_size == 0 {
        return Err(GleanError::ConfigError("chunk size must be at least 1".to_string()));
    }

    let total = items.len();
    let chunk_count = total.div_ceil(chunk_size);
    let mut results = Vec::with_capacity(total);
    let mut items = items.into_iter();

    for chunk in 0..chunk_count {
        let batch: Vec<Fut> = items.by_ref().take(chunk_size).map(&mut f).collect();
        tracing::debug!(chunk = chunk + 1, of = chunk_count, size = batch.len(), "running chunk");

        for outcome in join_all(batch).await {
            results.push(outcome?);
        }
    }

    Ok(results)
}

/// Collects a paginated listing, fetching `chunk_size` pages at a time.
///
/// Pages `0, 1, 2, ...` are requested in concurrent chunks until a page
/// comes back empty, or until a whole chunk of pages adds no item that was
/// not already collected (a listing that keeps serving its last page).
/// Items are de-duplicated by `key`, keeping the first occurrence, since
/// listings that shift while being paged can repeat entries across page
/// boundaries.
///
/// # Errors
///
/// Returns the first page error, or [`GleanError::ConfigError`] if
/// `chunk_size` is zero.
pub async fn collect_pages<T, K, F, Fut, KF>(chunk_size: usize, mut fetch_page: F, key: KF) -> Result<Vec<T>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
    KF: Fn(&T) -> K,
    K: Eq + Hash,
{
    if chunk_size == 0 {
        return Err(GleanError::ConfigError("chunk size must be at least 1".to_string()));
    }

    let mut seen = HashSet::new();
    let mut collected = Vec::new();
    let mut next_page = 0;

    loop {
        let pages = next_page..next_page + chunk_size;
        next_page += chunk_size;
        tracing::debug!(first = pages.start, last = pages.end - 1, "fetching listing pages");

        let before = collected.len();
        for page in join_all(pages.map(&mut fetch_page)).await {
            let page = page?;
            if page.is_empty() {
                return Ok(collected);
            }

            for item in page {
                if seen.insert(key(&item)) {
                    collected.push(item);
                }
            }
        }

        if collected.len() == before {
            tracing::warn!(last = next_page - 1, "listing pages repeat without new items, stopping");
            return Ok(collected);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_chunks_run_sequentially_in_order() {
        let log = &Mutex::new(Vec::new());
        let in_flight = &AtomicUsize::new(0);
        let peak = &AtomicUsize::new(0);

        let items: Vec<usize> = (0..23).collect();
        let results = for_each_chunked(items, 10, move |i| async move {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            log.lock().unwrap().push(("start", i));
            tokio::time::sleep(Duration::from_millis(10 * (10 - (i % 10) as u64))).await;
            log.lock().unwrap().push(("end", i));
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok::<_, GleanError>(i * 10)
        })
        .await
        .unwrap();

        assert_eq!(results, (0..23).map(|i| i * 10).collect::<Vec<_>>());
        assert_eq!(peak.load(Ordering::SeqCst), 10);

        let log = log.lock().unwrap();
        let position = |kind: &str, i: usize| log.iter().position(|entry| *entry == (kind, i)).unwrap();
        for chunk in [0..10, 10..20, 20..23] {
            let last_end = chunk.clone().map(|i| position("end", i)).max().unwrap();
            if chunk.end < 23 {
                let next_start = (chunk.end..(chunk.end + 10).min(23)).map(|i| position("start", i)).min().unwrap();
                assert!(last_end < next_start);
            }
        }
    }

    #[tokio::test]
    async fn test_failure_stops_later_chunks() {
        let started = &AtomicUsize::new(0);

        let result = for_each_chunked((0..30).collect(), 10, move |i: usize| async move {
            started.fetch_add(1, Ordering::SeqCst);
            if i == 12 || i == 15 {
                Err(GleanError::Status { status: 500, url: format!("/item/{i}") })
            } else {
                Ok(i)
            }
        })
        .await;

        assert!(matches!(result, Err(GleanError::Status { ref url, .. }) if url == "/item/12"));
        assert_eq!(started.load(Ordering::SeqCst), 20);
    }

    #[tokio::test]
    async fn test_empty_items() {
        let results = for_each_chunked(Vec::<u8>::new(), 4, |i| async move { Ok::<_, GleanError>(i) }).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_zero_chunk_size_rejected() {
        let result = for_each_chunked(vec![1], 0, |i| async move { Ok::<_, GleanError>(i) }).await;
        assert!(matches!(result, Err(GleanError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_collect_pages_until_empty_and_dedupes() {
        let requested = &Mutex::new(Vec::new());
        let pages: Vec<Vec<&str>> = vec![vec!["a", "b"], vec!["b", "c"], vec!["d"]];
        let pages = &pages;

        let items = collect_pages(
            2,
            move |page| async move {
                requested.lock().unwrap().push(page);
                Ok::<_, GleanError>(pages.get(page).cloned().unwrap_or_default())
            },
            |item: &&str| item.to_string(),
        )
        .await
        .unwrap();

        assert_eq!(items, vec!["a", "b", "c", "d"]);
        let mut requested = requested.lock().unwrap().clone();
        requested.sort_unstable();
        assert_eq!(requested, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_collect_pages_stops_when_pages_repeat() {
        let requested = &AtomicUsize::new(0);

        let items = collect_pages(
            3,
            move |page: usize| async move {
                requested.fetch_add(1, Ordering::SeqCst);
                let last = page.min(4);
                Ok::<_, GleanError>(vec![last * 2, last * 2 + 1])
            },
            |item: &usize| *item,
        )
        .await
        .unwrap();

        assert_eq!(items, (0..10).collect::<Vec<_>>());
        assert_eq!(requested.load(Ordering::SeqCst), 9);
    }
}
