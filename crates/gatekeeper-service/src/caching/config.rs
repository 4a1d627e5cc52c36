use std::time::Duration;

use serde::Deserialize;

/// Tuning for in-memory [`TtlCache`](super::TtlCache) instances.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a fetched value is served without triggering a refresh.
    ///
    /// After this time the value is considered stale. It is still served, but the next access
    /// kicks off a background refresh.
    ///
    /// Defaults to `60s`.
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,

    /// Maximum number of keys held per cache.
    ///
    /// This is a safety valve against unbounded key spaces. An evicted key is simply fetched
    /// again on its next access.
    ///
    /// Defaults to `10_000`.
    pub max_entries: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(60),
            max_entries: 10_000,
        }
    }
}
