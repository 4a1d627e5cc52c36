use thiserror::Error;

use super::Role;
use crate::error::{ConfigurationError, ErrorKind};

/// Errors returned by an [`IdentityVerifier`](super::IdentityVerifier).
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The token is malformed or its signature does not check out.
    #[error("session token is invalid")]
    Invalid,
    #[error("session has expired")]
    Expired,
    #[error("session has been revoked")]
    Revoked,
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// The identity provider could not be reached or failed unexpectedly.
    #[error("identity provider failed")]
    Backend(#[source] anyhow::Error),
}

/// Reasons a request is not allowed to proceed.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The request carries no session cookie.
    #[error("Not authenticated")]
    NotAuthenticated,
    /// The identity provider rejected the session token.
    #[error("Invalid session")]
    InvalidSession(#[source] VerifyError),
    /// The session is valid, but there is no profile for its subject.
    #[error("User profile not found")]
    ProfileMissing,
    #[error("Account has been deactivated")]
    Deactivated,
    #[error("Insufficient permissions. Requires {required} or higher.")]
    InsufficientPermission { required: Role },
    #[error(transparent)]
    Configuration(ConfigurationError),
    /// The identity provider or the profile store failed.
    #[error("failed to verify session")]
    Backend(#[source] anyhow::Error),
}

impl AuthError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::NotAuthenticated
            | AuthError::InvalidSession(_)
            | AuthError::ProfileMissing
            | AuthError::Deactivated => ErrorKind::Authentication,
            AuthError::InsufficientPermission { .. } => ErrorKind::Authorization,
            AuthError::Configuration(_) => ErrorKind::Configuration,
            AuthError::Backend(_) => ErrorKind::Internal,
        }
    }

    /// A short name of this error, used to tag metrics.
    pub(super) fn as_tag(&self) -> &'static str {
        match self {
            AuthError::NotAuthenticated => "not_authenticated",
            AuthError::InvalidSession(_) => "invalid_session",
            AuthError::ProfileMissing => "profile_missing",
            AuthError::Deactivated => "deactivated",
            AuthError::InsufficientPermission { .. } => "insufficient_permission",
            AuthError::Configuration(_) => "configuration",
            AuthError::Backend(_) => "backend",
        }
    }
}

impl From<VerifyError> for AuthError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::Invalid | VerifyError::Expired | VerifyError::Revoked => {
                AuthError::InvalidSession(err)
            }
            VerifyError::Configuration(err) => AuthError::Configuration(err),
            VerifyError::Backend(err) => AuthError::Backend(err),
        }
    }
}
