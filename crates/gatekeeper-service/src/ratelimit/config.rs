use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

/// The limit applied to a single identifier.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Number of requests allowed within one window.
    pub max_requests: u32,
    /// Length of a window, starting at the first request.
    #[serde(with = "humantime_serde")]
    pub window: Duration,
}

impl RateLimitConfig {
    pub const fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

impl Default for RateLimitConfig {
    /// 60 requests per minute.
    fn default() -> Self {
        Self::new(60, Duration::from_secs(60))
    }
}

/// Rate limiting configuration for all scopes.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RateLimitConfigs {
    /// Minimum time between two sweeps of expired windows.
    ///
    /// Defaults to `60s`.
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,

    /// Limits per scope, such as `public` or `admin`.
    ///
    /// Configuring this replaces the built-in scopes. Scopes that are not listed here use
    /// [`RateLimitConfig::default`].
    pub scopes: BTreeMap<String, RateLimitConfig>,
}

impl RateLimitConfigs {
    /// Returns the limit for `scope`, falling back to the default limit.
    pub fn scope(&self, scope: &str) -> RateLimitConfig {
        self.scopes.get(scope).copied().unwrap_or_default()
    }
}

impl Default for RateLimitConfigs {
    fn default() -> Self {
        let minute = Duration::from_secs(60);
        let scopes = BTreeMap::from([
            ("public".to_owned(), RateLimitConfig::new(100, minute)),
            ("admin".to_owned(), RateLimitConfig::new(30, minute)),
        ]);

        Self {
            sweep_interval: minute,
            scopes,
        }
    }
}
