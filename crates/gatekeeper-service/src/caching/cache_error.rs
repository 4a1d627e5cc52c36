use thiserror::Error;

use crate::error::ErrorKind;

/// An error that happens while fetching a value for the cache.
///
/// Errors are shared between every caller that waited on the same fetch, which is why this type
/// is [`Clone`] and carries the rendered error chain instead of the original error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The fetcher returned an error.
    #[error("failed to fetch `{key}`: {details}")]
    Fetch { key: String, details: String },
    /// The fetcher panicked or its task was cancelled.
    #[error("internal error")]
    InternalError,
}

impl CacheError {
    pub(super) fn fetch(key: &str, err: &anyhow::Error) -> Self {
        Self::Fetch {
            key: key.to_owned(),
            details: format!("{err:#}"),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::CacheFetch
    }
}
