//! Request governance for the content site.
//!
//! Every API entry point goes through some combination of the three components in this crate
//! before it touches durable storage:
//!
//! - [`ratelimit::RateLimiter`] bounds request volume per client within a fixed window.
//! - [`auth::SessionAuthority`] resolves a session cookie into a [`auth::Principal`] and
//!   enforces minimum-role gates.
//! - [`caching::TtlCache`] memoizes expensive reads with stale-while-revalidate semantics and
//!   single-flight de-duplication.
//!
//! All state is process-local. Running multiple instances multiplies the effective rate limits
//! and gives every instance its own stale-cache window.

#[macro_use]
pub mod metrics;

pub mod auth;
pub mod caching;
pub mod config;
pub mod content;
pub mod error;
pub mod logging;
pub mod ratelimit;
pub mod request;
pub mod services;
