use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::{IdentityVerifier, VerifiedIdentity, VerifyError};
use crate::error::ConfigurationError;

type VerifierFactory =
    Box<dyn Fn() -> Result<Arc<dyn IdentityVerifier>, ConfigurationError> + Send + Sync>;

/// An [`IdentityVerifier`] that is constructed on first use.
///
/// Constructing the real verifier usually needs credentials. Doing that lazily lets the service
/// start and serve public routes without them. A failed construction is reported as a
/// configuration error and tried again on the next verification.
pub struct LazyIdentityVerifier {
    factory: VerifierFactory,
    verifier: OnceCell<Arc<dyn IdentityVerifier>>,
}

impl LazyIdentityVerifier {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn IdentityVerifier>, ConfigurationError> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            verifier: OnceCell::new(),
        }
    }

    fn verifier(&self) -> Result<&Arc<dyn IdentityVerifier>, ConfigurationError> {
        self.verifier.get_or_try_init(|| {
            tracing::debug!("Initializing identity verifier");
            (self.factory)().inspect_err(|err| {
                tracing::error!(error = err as &dyn std::error::Error, "Identity verifier unavailable");
            })
        })
    }
}

impl fmt::Debug for LazyIdentityVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyIdentityVerifier")
            .field("initialized", &self.verifier.get().is_some())
            .finish()
    }
}

#[async_trait::async_trait]
impl IdentityVerifier for LazyIdentityVerifier {
    async fn verify_session(
        &self,
        token: &str,
        check_revoked: bool,
    ) -> Result<VerifiedIdentity, VerifyError> {
        let verifier = self.verifier()?;
        verifier.verify_session(token, check_revoked).await
    }
}
