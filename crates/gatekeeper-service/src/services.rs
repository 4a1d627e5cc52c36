//! Wires the governance components together according to the provided [`Config`].
//!
//! [`Governance`] is built once at startup and shared by all request handlers. It owns the rate
//! limiter, the session authority, and the content cache, so their state lives exactly as long as
//! the server.

use std::sync::Arc;

use axum::http::HeaderMap;
use serde_json::Value;

use crate::auth::{
    IdentityVerifier, LazyIdentityVerifier, ProfileStore, SessionAuthority,
    StaticIdentityVerifier, StaticProfileStore,
};
use crate::caching::{CacheError, TtlCache};
use crate::config::Config;
use crate::content::{CollectionName, ContentStore, FilesystemContentStore};
use crate::error::ConfigurationError;
use crate::ratelimit::{RateLimitOutcome, RateLimiter};
use crate::request;

/// A cached collection. `None` means the collection does not exist.
pub type CachedCollection = Option<Arc<Value>>;

pub struct Governance {
    pub config: Config,
    pub rate_limiter: RateLimiter,
    pub sessions: SessionAuthority,
    pub content_cache: TtlCache<CachedCollection>,
    pub content: Arc<dyn ContentStore>,
}

impl std::fmt::Debug for Governance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Governance")
            .field("rate_limiter", &self.rate_limiter)
            .field("sessions", &self.sessions)
            .field("content_cache", &self.content_cache)
            .finish_non_exhaustive()
    }
}

impl Governance {
    /// Creates the services with the built-in collaborators.
    ///
    /// Content is read from [`Config::content_dir`]. Sessions are verified against the
    /// [`identity`](Config::identity) section, which is only resolved once the first session
    /// needs verifying.
    pub fn new(config: Config) -> Self {
        let identity = config.identity.clone();
        let profiles = identity
            .as_ref()
            .map(|identity| identity.profiles.clone())
            .unwrap_or_default();

        let verifier = LazyIdentityVerifier::new(move || match &identity {
            Some(identity) => {
                let verifier = StaticIdentityVerifier::new(identity.sessions.clone());
                Ok(Arc::new(verifier) as Arc<dyn IdentityVerifier>)
            }
            None => Err(ConfigurationError::new(
                "no identity provider configured, add an `identity` section",
            )),
        });

        let content = FilesystemContentStore::new(&config.content_dir);
        if !content.root().is_dir() {
            tracing::warn!(
                "Content directory {} does not exist, all collections will be empty",
                content.root().display()
            );
        }

        Self::with_collaborators(
            config,
            Arc::new(verifier),
            Arc::new(StaticProfileStore::new(profiles)),
            Arc::new(content),
        )
    }

    /// Creates the services with the given external collaborators.
    pub fn with_collaborators(
        config: Config,
        verifier: Arc<dyn IdentityVerifier>,
        profiles: Arc<dyn ProfileStore>,
        content: Arc<dyn ContentStore>,
    ) -> Self {
        let rate_limiter = RateLimiter::from_config(&config.rate_limits);
        let sessions = SessionAuthority::new(verifier, profiles, config.session.clone());
        let content_cache = TtlCache::new("content", &config.cache);

        Self {
            config,
            rate_limiter,
            sessions,
            content_cache,
            content,
        }
    }

    /// Counts a request against the limit of `scope`, keyed by the client's address.
    pub fn check_rate_limit(&self, scope: &str, headers: &HeaderMap) -> RateLimitOutcome {
        let identifier = format!("{scope}:{}", request::client_ip(headers));
        let config = self.config.rate_limits.scope(scope);
        self.rate_limiter.check(&identifier, &config)
    }

    /// Loads a collection through the content cache.
    pub async fn cached_collection(
        &self,
        collection: &CollectionName,
    ) -> Result<CachedCollection, CacheError> {
        let content = Arc::clone(&self.content);
        let name = collection.clone();
        self.content_cache
            .get(collection.as_str(), move || async move {
                let documents = content.load_collection(&name).await?;
                Ok::<_, anyhow::Error>(documents.map(Arc::new))
            })
            .await
    }

    /// Loads a collection straight from the store, bypassing the cache.
    pub async fn fresh_collection(
        &self,
        collection: &CollectionName,
    ) -> anyhow::Result<Option<Value>> {
        self.content.load_collection(collection).await
    }

    /// Drops the cached copy of `collection`.
    pub fn invalidate_collection(&self, collection: &CollectionName) {
        self.content_cache.invalidate(collection.as_str());
    }

    /// Drops all cached content.
    pub fn invalidate_all_content(&self) {
        self.content_cache.invalidate_all();
    }
}
