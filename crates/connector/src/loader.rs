//! Request-scoped batching cache.
//!
//! A [`Loader`] coalesces every key requested during the same scheduling turn
//! into one call of its batch function and memoizes the settled result per
//! key, so each key is fetched at most once for the lifetime of the loader.
//! Errors are memoized too: every caller of a failed key sees the same error.
//!
//! Loaders live exactly as long as the domain object (or object tree) that
//! created them, which in practice means one storefront request.

use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use futures::future::{BoxFuture, FutureExt, Shared, join_all, ready};
use moka::sync::Cache;
use tracing::debug;

use crate::error::CifError;

type BatchFn<K, V> =
    dyn Fn(Vec<K>) -> BoxFuture<'static, Vec<Result<V, CifError>>> + Send + Sync;
type SharedResult<V> = Shared<BoxFuture<'static, Result<V, CifError>>>;
type SharedBatch<V> = Shared<BoxFuture<'static, Arc<Vec<Result<V, CifError>>>>>;

/// Batching, memoizing key/value loader.
pub struct Loader<K, V> {
    inner: Arc<Inner<K, V>>,
}

struct Inner<K, V> {
    name: &'static str,
    fetch: Arc<BatchFn<K, V>>,
    cache: Cache<K, SharedResult<V>>,
    pending: Mutex<Option<PendingBatch<K, V>>>,
    next_batch: AtomicU64,
}

/// Keys collected for a batch that has not been dispatched yet.
struct PendingBatch<K, V> {
    id: u64,
    keys: Vec<K>,
    results: SharedBatch<V>,
}

impl<K, V> Loader<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a loader from a batch function.
    ///
    /// `fetch` receives the distinct keys of one batch and must return one
    /// result per key, in key order. Keys without a matching result fail with
    /// [`CifError::Internal`].
    pub fn new<F, Fut>(name: &'static str, fetch: F) -> Self
    where
        F: Fn(Vec<K>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Vec<Result<V, CifError>>> + Send + 'static,
    {
        let fetch: Arc<BatchFn<K, V>> = Arc::new(move |keys| fetch(keys).boxed());
        Self {
            inner: Arc::new(Inner {
                name,
                fetch,
                cache: Cache::builder().build(),
                pending: Mutex::new(None),
                next_batch: AtomicU64::new(0),
            }),
        }
    }

    /// Create a loader whose batch function fetches every key on its own.
    ///
    /// Used for backend queries that take a single id; the per-key requests
    /// of one batch still run concurrently.
    pub fn per_key<F, Fut>(name: &'static str, fetch: F) -> Self
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<V, CifError>> + Send + 'static,
    {
        let fetch = Arc::new(fetch);
        Self::new(name, move |keys: Vec<K>| {
            let fetch = Arc::clone(&fetch);
            async move { join_all(keys.into_iter().map(|key| (*fetch)(key))).await }
        })
    }

    /// Name used in log output.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    /// Load one key.
    ///
    /// # Errors
    ///
    /// Returns the error the batch function produced for this key, shared
    /// with every other caller of the same key.
    pub async fn load(&self, key: K) -> Result<V, CifError> {
        self.pending(key).await
    }

    /// Memoized result for `key`, joining the open batch on a miss.
    ///
    /// Runs without suspending, so every key requested before the batch is
    /// first polled lands in that batch.
    fn pending(&self, key: K) -> SharedResult<V> {
        let batched_key = key.clone();
        self.inner
            .cache
            .entry(key)
            .or_insert_with(|| enqueue(&self.inner, batched_key))
            .into_value()
    }

    /// Load several keys, returning one settled result per key.
    pub async fn load_many(&self, keys: impl IntoIterator<Item = K>) -> Vec<Result<V, CifError>> {
        let pending: Vec<SharedResult<V>> = keys.into_iter().map(|key| self.pending(key)).collect();
        join_all(pending).await
    }

    /// Seed the cache with an already known value.
    ///
    /// Does nothing if the key was already loaded, primed or is in flight.
    pub fn prime(&self, key: K, value: V) {
        let settled: BoxFuture<'static, Result<V, CifError>> = ready(Ok(value)).boxed();
        self.inner.cache.entry(key).or_insert(settled.shared());
    }
}

/// Add `key` to the open batch, opening one if necessary.
fn enqueue<K, V>(inner: &Arc<Inner<K, V>>, key: K) -> SharedResult<V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    let mut pending = inner.pending.lock().unwrap_or_else(PoisonError::into_inner);
    let batch = pending.get_or_insert_with(|| open_batch(inner));
    batch.keys.push(key);
    let index = batch.keys.len() - 1;
    let results = batch.results.clone();
    drop(pending);

    let name = inner.name;
    async move {
        results.await.get(index).cloned().unwrap_or_else(|| {
            Err(CifError::Internal(format!(
                "{name} loader returned no result for key #{index}"
            )))
        })
    }
    .boxed()
    .shared()
}

/// Create a batch that collects keys until its results are first polled,
/// then waits one more scheduling turn before dispatching.
fn open_batch<K, V>(inner: &Arc<Inner<K, V>>) -> PendingBatch<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    let id = inner.next_batch.fetch_add(1, Ordering::Relaxed);
    let weak: Weak<Inner<K, V>> = Arc::downgrade(inner);

    let results = async move {
        tokio::task::yield_now().await;

        let Some(inner) = weak.upgrade() else {
            return Arc::new(Vec::new());
        };
        let keys = {
            let mut pending = inner.pending.lock().unwrap_or_else(PoisonError::into_inner);
            match pending.take() {
                Some(batch) if batch.id == id => batch.keys,
                other => {
                    *pending = other;
                    Vec::new()
                }
            }
        };
        let fetch = Arc::clone(&inner.fetch);
        let name = inner.name;
        drop(inner);

        debug!(loader = name, keys = keys.len(), "Dispatching loader batch");
        Arc::new(fetch(keys).await)
    }
    .boxed()
    .shared();

    PendingBatch {
        id,
        keys: Vec::new(),
        results,
    }
}

impl<K, V> Clone for Loader<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> fmt::Debug for Loader<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("name", &self.inner.name)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    /// Loader that doubles its keys and records every batch it receives.
    fn doubling_loader() -> (Loader<u32, u32>, Arc<Mutex<Vec<Vec<u32>>>>) {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&batches);
        let loader = Loader::new("doubling", move |keys: Vec<u32>| {
            seen.lock().unwrap().push(keys.clone());
            async move { keys.into_iter().map(|key| Ok(key * 2)).collect() }
        });
        (loader, batches)
    }

    #[tokio::test]
    async fn test_single_flight_per_key() {
        let (loader, batches) = doubling_loader();

        let (a, b) = tokio::join!(loader.load(7), loader.load(7));
        assert_eq!(a.unwrap(), 14);
        assert_eq!(b.unwrap(), 14);
        assert_eq!(loader.load(7).await.unwrap(), 14);

        assert_eq!(batches.lock().unwrap().as_slice(), &[vec![7]]);
    }

    #[tokio::test]
    async fn test_same_turn_loads_share_a_batch() {
        let (loader, batches) = doubling_loader();

        let results = loader.load_many([1, 2, 3]).await;
        let values: Vec<u32> = results.into_iter().map(Result::unwrap).collect();
        assert_eq!(values, vec![2, 4, 6]);

        // A later turn opens a new batch.
        assert_eq!(loader.load(4).await.unwrap(), 8);
        assert_eq!(
            batches.lock().unwrap().as_slice(),
            &[vec![1, 2, 3], vec![4]]
        );
    }

    #[tokio::test]
    async fn test_concurrent_loads_share_a_batch() {
        let (loader, batches) = doubling_loader();

        let (a, b, c) = tokio::join!(loader.load(1), loader.load(2), loader.load(3));
        assert_eq!((a.unwrap(), b.unwrap(), c.unwrap()), (2, 4, 6));

        let more = join_all((10..40).map(|key| loader.load(key))).await;
        assert!(more.iter().all(Result::is_ok));

        let mut batches = batches.lock().unwrap().clone();
        batches.iter_mut().for_each(|keys| keys.sort_unstable());
        assert_eq!(batches, vec![vec![1, 2, 3], (10..40).collect::<Vec<u32>>()]);
    }

    #[tokio::test]
    async fn test_prime_before_load_skips_fetch() {
        let (loader, batches) = doubling_loader();

        loader.prime(5, 100);
        assert_eq!(loader.load(5).await.unwrap(), 100);
        assert!(batches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prime_after_load_is_noop() {
        let (loader, batches) = doubling_loader();

        assert_eq!(loader.load(5).await.unwrap(), 10);
        loader.prime(5, 100);
        assert_eq!(loader.load(5).await.unwrap(), 10);
        assert_eq!(batches.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_per_key_failure_is_isolated() {
        let loader = Loader::new("flaky", |keys: Vec<u32>| async move {
            keys.into_iter()
                .map(|key| {
                    if key == 2 {
                        Err(CifError::NotFound(format!("key {key} was not found")))
                    } else {
                        Ok(key)
                    }
                })
                .collect()
        });

        let results = loader.load_many([1, 2, 3]).await;
        assert_eq!(results[0].as_ref().unwrap(), &1);
        assert_eq!(
            results[1].as_ref().unwrap_err().to_string(),
            "key 2 was not found"
        );
        assert_eq!(results[2].as_ref().unwrap(), &3);
    }

    #[tokio::test]
    async fn test_errors_are_memoized() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let loader: Loader<&'static str, u32> = Loader::per_key("failing", move |_key| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(CifError::Transport("connection refused".to_string())) }
        });

        assert!(loader.load("a").await.is_err());
        assert!(loader.load("a").await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_short_batch_result_is_internal_error() {
        let loader = Loader::new("short", |keys: Vec<u32>| async move {
            keys.into_iter().take(1).map(Ok).collect()
        });

        let results = loader.load_many([1, 2]).await;
        assert_eq!(results[0].as_ref().unwrap(), &1);
        assert!(matches!(results[1], Err(CifError::Internal(_))));
    }

    #[tokio::test]
    async fn test_clones_share_the_cache() {
        let (loader, batches) = doubling_loader();
        let shared = loader.clone();

        loader.prime(1, 42);
        assert_eq!(shared.load(1).await.unwrap(), 42);
        assert_eq!(shared.name(), "doubling");
        assert!(batches.lock().unwrap().is_empty());
    }
}
