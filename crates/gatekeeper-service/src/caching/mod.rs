//! # In-memory caching
//!
//! Content reads sit behind a [`TtlCache`]. The cache exists to keep read latency low and
//! bounded even when the document store is slow, and to make sure a burst of identical requests
//! results in a single fetch.
//!
//! ## States of a key
//!
//! - **Fresh**: the entry has not yet expired. It is returned as-is, the fetcher is not called.
//! - **Stale**: the entry has expired. It is still returned immediately, and a refresh is
//!   started in the background unless one is already running for that key. A failing refresh is
//!   logged and the stale value keeps being served.
//! - **Cold**: there is no entry. The caller joins the running fetch for that key, or starts
//!   one. Every caller waiting on the same fetch gets the same value or the same error, and a
//!   failed fetch stores nothing.
//!
//! [`TtlCache::invalidate`] and [`TtlCache::invalidate_all`] drop the entry together with any
//! running fetch marker, so the next access is a cold miss. A fetch that was running while its
//! key got invalidated still resolves for the callers that waited on it, but its result is
//! thrown away instead of being stored.
//!
//! ## Single flight
//!
//! Fetches are spawned onto the runtime and tracked in a map of running fetches keyed by cache
//! key. The marker is inserted before anybody awaits the fetch, and it is removed when the
//! fetch settles, including when the fetcher panics. Since fetches run on their own task, a
//! caller that gives up waiting does not cancel the fetch for everybody else.
//!
//! There are no timeouts. A fetcher that never completes blocks every caller coalesced onto
//! it, so callers that need bounded latency have to wrap their fetcher in a timeout.
//!
//! ## Metrics
//!
//! - `cache.access`: every call to [`TtlCache::get`].
//! - `cache.hit`: tagged with `state:fresh` or `state:stale`.
//! - `cache.miss`: no entry was present.
//! - `cache.coalesced`: a cold caller joined a running fetch.
//! - `cache.refresh`: a background refresh was started for a stale entry.
//! - `cache.fetch.failed`: a fetcher returned an error, tagged with `is_refresh`.

mod cache_error;
mod config;
mod memory;

#[cfg(test)]
mod tests;

pub use cache_error::CacheError;
pub use config::CacheConfig;
pub use memory::TtlCache;
