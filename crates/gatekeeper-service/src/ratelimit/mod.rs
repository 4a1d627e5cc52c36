//! Fixed-window rate limiting.
//!
//! The [`RateLimiter`] counts requests per identifier, usually `scope:client_ip`. The first
//! request of an identifier opens a window of [`RateLimitConfig::window`] length. Every further
//! request within that window increments the count, and requests beyond
//! [`RateLimitConfig::max_requests`] are rejected. Rejected requests keep counting, so hammering
//! a limited endpoint does not end the window early. Once the window has passed, the next request
//! opens a new one.
//!
//! Windows are fixed, not sliding. A client sending `max_requests` right before the end of a
//! window and `max_requests` right after it gets up to twice the nominal rate through.
//!
//! Expired windows are swept opportunistically while checking, at most once per
//! [`RateLimitConfigs::sweep_interval`], which bounds memory under many distinct clients.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;

use crate::error::ErrorKind;

mod config;

pub use config::{RateLimitConfig, RateLimitConfigs};

/// The state of a single identifier's current window.
#[derive(Clone, Copy, Debug)]
struct RateLimitEntry {
    /// Requests seen in this window, including rejected ones.
    count: u32,
    /// When this window ends. Fixed when the window opens.
    reset_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct LimiterState {
    entries: HashMap<String, RateLimitEntry>,
    last_sweep: Option<DateTime<Utc>>,
}

/// The outcome of [`RateLimiter::check`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitOutcome {
    /// Whether the request may proceed.
    pub success: bool,
    /// The configured maximum for the window.
    pub limit: u32,
    /// Requests left in the current window.
    pub remaining: u32,
    /// When the current window ends.
    pub reset_at: DateTime<Utc>,
    /// Time left until `reset_at`, as seen by the check.
    pub reset_after: Duration,
}

impl RateLimitOutcome {
    /// Whole seconds until the window resets, rounded up.
    pub fn reset_after_secs(&self) -> u64 {
        let secs = self.reset_after.as_secs();
        if self.reset_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }

    /// Turns a rejection into a [`RateLimitExceeded`] error.
    pub fn into_result(self) -> Result<Self, RateLimitExceeded> {
        if self.success {
            Ok(self)
        } else {
            Err(RateLimitExceeded {
                limit: self.limit,
                reset_at: self.reset_at,
                retry_after_secs: self.reset_after_secs(),
            })
        }
    }
}

/// A client exceeded its rate limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("too many requests, retry in {retry_after_secs}s")]
pub struct RateLimitExceeded {
    pub limit: u32,
    pub reset_at: DateTime<Utc>,
    pub retry_after_secs: u64,
}

impl RateLimitExceeded {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::RateLimitExceeded
    }
}

/// Counts requests per identifier in fixed windows.
#[derive(Debug)]
pub struct RateLimiter {
    sweep_interval: TimeDelta,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(sweep_interval: Duration) -> Self {
        Self {
            sweep_interval: TimeDelta::from_std(sweep_interval).unwrap_or(TimeDelta::MAX),
            state: Default::default(),
        }
    }

    /// Creates a rate limiter with the sweep interval from `configs`.
    pub fn from_config(configs: &RateLimitConfigs) -> Self {
        Self::new(configs.sweep_interval)
    }

    /// Counts a request for `identifier` against `config`, at the current time.
    pub fn check(&self, identifier: &str, config: &RateLimitConfig) -> RateLimitOutcome {
        self.check_at(identifier, config, Utc::now())
    }

    /// Counts a request for `identifier` against `config`, as if it arrived at `now`.
    pub fn check_at(
        &self,
        identifier: &str,
        config: &RateLimitConfig,
        now: DateTime<Utc>,
    ) -> RateLimitOutcome {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.maybe_sweep(&mut state, now);

        let entry = match state.entries.get_mut(identifier) {
            Some(entry) if now <= entry.reset_at => {
                entry.count = entry.count.saturating_add(1);
                *entry
            }
            _ => {
                let entry = RateLimitEntry {
                    count: 1,
                    reset_at: window_end(now, config.window),
                };
                state.entries.insert(identifier.to_owned(), entry);
                entry
            }
        };
        drop(state);

        let success = entry.count <= config.max_requests;
        let remaining = config.max_requests.saturating_sub(entry.count);
        let reset_after = (entry.reset_at - now).to_std().unwrap_or_default();

        let result = if success { "allowed" } else { "rejected" };
        metric!(counter("ratelimit.check") += 1, "result" => result);
        if !success {
            tracing::debug!(identifier, count = entry.count, "Rate limit exceeded");
        }

        RateLimitOutcome {
            success,
            limit: config.max_requests,
            remaining,
            reset_at: entry.reset_at,
            reset_after,
        }
    }

    /// The number of identifiers currently tracked.
    pub fn len(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn maybe_sweep(&self, state: &mut LimiterState, now: DateTime<Utc>) {
        let due = state
            .last_sweep
            .is_none_or(|last| now - last >= self.sweep_interval);
        if !due {
            return;
        }

        state.last_sweep = Some(now);
        let before = state.entries.len();
        state.entries.retain(|_, entry| entry.reset_at >= now);

        let remaining = state.entries.len();
        if remaining < before {
            tracing::trace!("Swept {} expired rate limit windows", before - remaining);
        }
        metric!(gauge("ratelimit.entries") = remaining as u64);
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_config(&RateLimitConfigs::default())
    }
}

fn window_end(start: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    let window = TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX);
    start
        .checked_add_signed(window)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn secs(secs: i64) -> TimeDelta {
        TimeDelta::seconds(secs)
    }

    #[test]
    fn test_window_boundary() {
        let limiter = RateLimiter::default();
        let config = RateLimitConfig::new(5, Duration::from_secs(10));
        let now = start();

        for expected in [4, 3, 2, 1, 0] {
            let outcome = limiter.check_at("public:10.0.0.1", &config, now);
            assert!(outcome.success);
            assert_eq!(outcome.remaining, expected);
            assert_eq!(outcome.limit, 5);
            assert_eq!(outcome.reset_at, now + secs(10));
        }

        let rejected = limiter.check_at("public:10.0.0.1", &config, now + secs(1));
        assert!(!rejected.success);
        assert_eq!(rejected.remaining, 0);
        assert_eq!(rejected.reset_after, Duration::from_secs(9));

        // The window is still open exactly at `reset_at`.
        let rejected = limiter.check_at("public:10.0.0.1", &config, now + secs(10));
        assert!(!rejected.success);

        let fresh = limiter.check_at("public:10.0.0.1", &config, now + secs(11));
        assert!(fresh.success);
        assert_eq!(fresh.remaining, 4);
        assert_eq!(fresh.reset_at, now + secs(21));
    }

    #[test]
    fn test_rejections_do_not_extend_window() {
        let limiter = RateLimiter::default();
        let config = RateLimitConfig::new(1, Duration::from_secs(10));
        let now = start();

        assert!(limiter.check_at("admin:a", &config, now).success);
        for offset in 1..=10 {
            let outcome = limiter.check_at("admin:a", &config, now + secs(offset));
            assert!(!outcome.success);
            assert_eq!(outcome.reset_at, now + secs(10));
        }
        assert!(limiter.check_at("admin:a", &config, now + secs(11)).success);
    }

    #[test]
    fn test_identifiers_are_independent() {
        let limiter = RateLimiter::default();
        let config = RateLimitConfig::new(1, Duration::from_secs(10));
        let now = start();

        assert!(limiter.check_at("public:10.0.0.1", &config, now).success);
        assert!(!limiter.check_at("public:10.0.0.1", &config, now).success);
        assert!(limiter.check_at("public:10.0.0.2", &config, now).success);
        assert!(limiter.check_at("admin:10.0.0.1", &config, now).success);
    }

    #[test]
    fn test_sweep_removes_expired_windows() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        let config = RateLimitConfig::new(5, Duration::from_secs(10));
        let now = start();

        for client in 0..50 {
            limiter.check_at(&format!("public:{client}"), &config, now);
        }
        assert_eq!(limiter.len(), 50);

        // Windows have expired, but the sweep interval has not yet passed.
        limiter.check_at("public:late", &config, now + secs(30));
        assert_eq!(limiter.len(), 51);

        limiter.check_at("public:later", &config, now + secs(60));
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn test_into_result() {
        let limiter = RateLimiter::default();
        let config = RateLimitConfig::new(1, Duration::from_secs(30));
        let now = start();

        let allowed = limiter.check_at("public:a", &config, now).into_result();
        assert!(allowed.is_ok());

        let err = limiter
            .check_at("public:a", &config, now + TimeDelta::milliseconds(500))
            .into_result()
            .unwrap_err();
        assert_eq!(err.limit, 1);
        assert_eq!(err.retry_after_secs, 30);
        assert_eq!(err.kind(), ErrorKind::RateLimitExceeded);
        insta::assert_snapshot!(err, @"too many requests, retry in 30s");
    }

    #[test]
    fn test_zero_limit_rejects_everything() {
        let limiter = RateLimiter::default();
        let config = RateLimitConfig::new(0, Duration::from_secs(10));

        let outcome = limiter.check_at("public:a", &config, start());
        assert!(!outcome.success);
        assert_eq!(outcome.remaining, 0);
    }
}
