//! Error classification shared by all governance components.
//!
//! Each error type in this crate reports its [`ErrorKind`]. Callers map errors to responses by
//! matching on the typed error, never by inspecting its message.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The broad category of a governance failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Required credentials or configuration are missing.
    Configuration,
    /// The request could not be tied to an active user with a profile.
    Authentication,
    /// The user is known but lacks the required role.
    Authorization,
    /// The client sent too many requests in the current window.
    RateLimitExceeded,
    /// A cache had nothing to serve and fetching a fresh value failed.
    CacheFetch,
    /// An external collaborator failed unexpectedly.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Authorization => "authorization",
            ErrorKind::RateLimitExceeded => "rate_limit_exceeded",
            ErrorKind::CacheFetch => "cache_fetch",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Required credentials or configuration are absent.
///
/// The message is meant for operators. It must not be shown to end users.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("configuration error: {0}")]
pub struct ConfigurationError(String);

impl ConfigurationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}
