use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{self, BoxFuture, Shared};
use tokio::time::Instant;

use super::{CacheConfig, CacheError};

/// Used as expiration when `now + ttl` does not fit into an [`Instant`].
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// An item saved in the in-memory moka cache.
///
/// Entries are replaced wholesale on refresh, never mutated in place.
#[derive(Clone, Debug)]
struct CacheEntry<T> {
    /// The actual data.
    data: T,
    /// When this entry turns stale.
    expires_at: Instant,
}

/// A fetch whose outcome is handed to every caller waiting on it.
type SharedFetch<T> = Shared<BoxFuture<'static, Result<T, CacheError>>>;

/// A currently running fetch for a single key.
struct InFlight<T> {
    /// Distinguishes this fetch from any later fetch of the same key.
    id: u64,
    fetch: SharedFetch<T>,
}

type InFlightMap<T> = Arc<Mutex<HashMap<String, InFlight<T>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes the in-flight marker of a fetch once it settles.
///
/// This lives inside the spawned fetch task, so the marker is also cleared if the fetcher
/// panics. A marker that was replaced in the meantime (after an invalidation) is left alone.
struct InFlightGuard<T> {
    in_flight: InFlightMap<T>,
    key: String,
    id: u64,
}

impl<T> Drop for InFlightGuard<T> {
    fn drop(&mut self) {
        let mut in_flight = lock(&self.in_flight);
        if in_flight
            .get(&self.key)
            .is_some_and(|running| running.id == self.id)
        {
            in_flight.remove(&self.key);
        }
    }
}

/// An in-memory TTL cache with stale-while-revalidate and request coalescing.
///
/// See the [module docs](super) for the exact semantics. Cloning is cheap and clones share
/// their state.
pub struct TtlCache<T> {
    name: Arc<str>,
    default_ttl: Duration,

    /// The stored values, bounded by [`CacheConfig::max_entries`].
    entries: moka::sync::Cache<String, CacheEntry<T>>,

    /// Fetches that are currently running, keyed by cache key.
    ///
    /// Values are only ever stored into `entries` while holding this lock, which keeps stores
    /// and invalidations from interleaving.
    in_flight: InFlightMap<T>,

    next_fetch_id: Arc<AtomicU64>,
}

impl<T> Clone for TtlCache<T> {
    fn clone(&self) -> Self {
        TtlCache {
            name: Arc::clone(&self.name),
            default_ttl: self.default_ttl,
            entries: self.entries.clone(),
            in_flight: Arc::clone(&self.in_flight),
            next_fetch_id: Arc::clone(&self.next_fetch_id),
        }
    }
}

impl<T> fmt::Debug for TtlCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let running = self
            .in_flight
            .try_lock()
            .map(|in_flight| in_flight.len())
            .unwrap_or_default();
        f.debug_struct("TtlCache")
            .field("name", &self.name)
            .field("default_ttl", &self.default_ttl)
            .field("in-memory items", &self.entries.entry_count())
            .field("running fetches", &running)
            .finish()
    }
}

impl<T> TtlCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a new cache. The `name` is used to tag logs and metrics.
    pub fn new(name: &str, config: &CacheConfig) -> Self {
        let entries = moka::sync::Cache::builder()
            .name(name)
            .max_capacity(config.max_entries)
            .build();

        TtlCache {
            name: Arc::from(name),
            default_ttl: config.default_ttl,
            entries,
            in_flight: Default::default(),
            next_fetch_id: Default::default(),
        }
    }

    /// Returns the value for `key`, using the default TTL when a fetch is needed.
    ///
    /// See [`get_with_ttl`](Self::get_with_ttl).
    pub async fn get<F, Fut>(&self, key: &str, fetcher: F) -> Result<T, CacheError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.get_with_ttl(key, self.default_ttl, fetcher).await
    }

    /// Returns the value for `key`, fetching it with `fetcher` if needed.
    ///
    /// `fetcher` is only invoked when this call has to start a new fetch. Fresh and stale hits
    /// return without waiting. Errors are only returned on a cold miss, in which case every
    /// caller coalesced onto the same fetch receives the same error.
    pub async fn get_with_ttl<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        fetcher: F,
    ) -> Result<T, CacheError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let name = self.name.as_ref();
        metric!(counter("cache.access") += 1, "cache" => name);

        if let Some(entry) = self.entries.get(key) {
            if entry.expires_at > Instant::now() {
                metric!(counter("cache.hit") += 1, "cache" => name, "state" => "fresh");
            } else {
                metric!(counter("cache.hit") += 1, "cache" => name, "state" => "stale");
                self.spawn_refresh(key, ttl, fetcher);
            }
            return Ok(entry.data);
        }

        metric!(counter("cache.miss") += 1, "cache" => name);
        self.join_or_fetch(key, ttl, fetcher).await
    }

    /// Drops the value and any running fetch marker for `key`.
    pub fn invalidate(&self, key: &str) {
        let mut in_flight = lock(&self.in_flight);
        in_flight.remove(key);
        self.entries.invalidate(key);
        tracing::debug!(cache = %self.name, key, "Invalidated cache entry");
    }

    /// Drops all values and running fetch markers.
    pub fn invalidate_all(&self) {
        let mut in_flight = lock(&self.in_flight);
        in_flight.clear();
        self.entries.invalidate_all();
        tracing::debug!(cache = %self.name, "Invalidated all cache entries");
    }

    /// Joins the running fetch for `key`, or starts a new one.
    fn join_or_fetch<F, Fut>(&self, key: &str, ttl: Duration, fetcher: F) -> SharedFetch<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let mut in_flight = lock(&self.in_flight);
        if let Some(running) = in_flight.get(key) {
            metric!(counter("cache.coalesced") += 1, "cache" => self.name.as_ref());
            return running.fetch.clone();
        }

        // A fetch might have been stored between our lookup and taking the lock.
        if let Some(entry) = self.entries.get(key) {
            return future::ready(Ok(entry.data)).boxed().shared();
        }

        self.start_fetch(&mut in_flight, key, ttl, fetcher, false)
    }

    /// Starts a background refresh of a stale `key`, unless a fetch is already running.
    fn spawn_refresh<F, Fut>(&self, key: &str, ttl: Duration, fetcher: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let mut in_flight = lock(&self.in_flight);
        if in_flight.contains_key(key) {
            return;
        }

        metric!(counter("cache.refresh") += 1, "cache" => self.name.as_ref());
        tracing::trace!("Spawning background refresh of `{}` in {} cache", key, self.name);

        // Nobody awaits a refresh. The spawned task completes it on its own.
        let _refresh = self.start_fetch(&mut in_flight, key, ttl, fetcher, true);
    }

    /// Spawns a fetch for `key` and registers it as running.
    ///
    /// Must be called with the `in_flight` lock held, so the marker is in place before anybody
    /// can observe the fetch.
    fn start_fetch<F, Fut>(
        &self,
        in_flight: &mut HashMap<String, InFlight<T>>,
        key: &str,
        ttl: Duration,
        fetcher: F,
        is_refresh: bool,
    ) -> SharedFetch<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        // The caller holds the `in_flight` lock, so a panic must not unwind from here.
        let fetched = match panic::catch_unwind(AssertUnwindSafe(fetcher)) {
            Ok(fetched) => fetched,
            Err(_) => {
                tracing::error!(cache = %self.name, key, "Cache fetcher panicked");
                return future::ready(Err(CacheError::InternalError))
                    .boxed()
                    .shared();
            }
        };

        let id = self.next_fetch_id.fetch_add(1, Ordering::Relaxed);
        let guard = InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            key: key.to_owned(),
            id,
        };

        let this = self.clone();
        let task_key = key.to_owned();
        let task = async move {
            let _guard = guard;

            match fetched.await {
                Ok(data) => {
                    this.store(&task_key, id, data.clone(), ttl);
                    Ok(data)
                }
                Err(err) => {
                    let error = CacheError::fetch(&task_key, &err);
                    metric!(
                        counter("cache.fetch.failed") += 1,
                        "cache" => this.name.as_ref(),
                        "is_refresh" => if is_refresh { "true" } else { "false" },
                    );
                    if is_refresh {
                        tracing::warn!(
                            cache = %this.name,
                            error = %error,
                            "Background refresh failed, keeping stale value",
                        );
                    }
                    Err(error)
                }
            }
        };

        let handle = tokio::spawn(task);
        let fetch = async move {
            handle.await.unwrap_or_else(|err| {
                tracing::error!(
                    error = &err as &dyn std::error::Error,
                    "Cache fetch did not complete",
                );
                Err(CacheError::InternalError)
            })
        }
        .boxed()
        .shared();

        in_flight.insert(
            key.to_owned(),
            InFlight {
                id,
                fetch: fetch.clone(),
            },
        );
        fetch
    }

    /// Stores a fetched value, unless its fetch was invalidated in the meantime.
    fn store(&self, key: &str, id: u64, data: T, ttl: Duration) {
        let in_flight = lock(&self.in_flight);
        if !in_flight.get(key).is_some_and(|running| running.id == id) {
            tracing::debug!(cache = %self.name, key, "Discarding result of an invalidated fetch");
            return;
        }

        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .unwrap_or_else(|| now + FAR_FUTURE);
        self.entries
            .insert(key.to_owned(), CacheEntry { data, expires_at });
    }
}
