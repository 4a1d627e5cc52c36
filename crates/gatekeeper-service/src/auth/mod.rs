//! Session verification and role gates.
//!
//! [`SessionAuthority::verify`] turns the session cookie of a request into a [`Principal`]:
//!
//! 1. The session token is read from the configured cookie. Without one, the request is
//!    [`NotAuthenticated`](AuthError::NotAuthenticated).
//! 2. The [`IdentityVerifier`] checks the token, including revocation if configured.
//! 3. The [`ProfileStore`] provides the role and status of the subject.
//! 4. Deactivated accounts are rejected, except for [`Role::SuperAdmin`] which can never be
//!    locked out.
//!
//! Principals are computed for every request and never cached. [`require_role`] then gates an
//! operation on a minimum role.

use std::sync::Arc;

use axum::http::HeaderMap;
use serde::Serialize;

use crate::request;

mod config;
mod error;
mod identity;
mod lazy;
mod role;
mod static_identity;

pub use config::{IdentityConfig, SessionConfig, SessionIdentity};
pub use error::{AuthError, VerifyError};
pub use identity::{IdentityVerifier, Profile, ProfileStore, VerifiedIdentity};
pub use lazy::LazyIdentityVerifier;
pub use role::{ParseRoleError, Role};
pub use static_identity::{StaticIdentityVerifier, StaticProfileStore};

/// An authenticated and active user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub uid: String,
    pub role: Role,
    pub email: String,
    pub name: String,
}

/// Succeeds if `actual` ranks at least as high as `min`.
pub fn require_role(actual: Role, min: Role) -> Result<(), AuthError> {
    if actual.rank() >= min.rank() {
        Ok(())
    } else {
        Err(AuthError::InsufficientPermission { required: min })
    }
}

/// Resolves requests into [`Principal`]s.
#[derive(Clone)]
pub struct SessionAuthority {
    verifier: Arc<dyn IdentityVerifier>,
    profiles: Arc<dyn ProfileStore>,
    config: SessionConfig,
}

impl std::fmt::Debug for SessionAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAuthority")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SessionAuthority {
    pub fn new(
        verifier: Arc<dyn IdentityVerifier>,
        profiles: Arc<dyn ProfileStore>,
        config: SessionConfig,
    ) -> Self {
        Self {
            verifier,
            profiles,
            config,
        }
    }

    /// Verifies the session cookie in `headers`.
    pub async fn verify(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let result = match request::cookie(headers, &self.config.cookie_name) {
            Some(token) => self.verify_token(token).await,
            None => Err(AuthError::NotAuthenticated),
        };

        let tag = match &result {
            Ok(_) => "ok",
            Err(err) => err.as_tag(),
        };
        metric!(counter("auth.verify") += 1, "result" => tag);
        result
    }

    /// Verifies a raw session token.
    pub async fn verify_token(&self, token: &str) -> Result<Principal, AuthError> {
        let identity = self
            .verifier
            .verify_session(token, self.config.check_revoked)
            .await?;

        let profile = self
            .profiles
            .load_profile(&identity.uid)
            .await
            .map_err(AuthError::Backend)?
            .ok_or(AuthError::ProfileMissing)?;

        if profile.role != Role::SuperAdmin && !profile.active {
            tracing::debug!(uid = %identity.uid, "Rejecting deactivated account");
            return Err(AuthError::Deactivated);
        }

        let email = if profile.email.is_empty() {
            identity.email.unwrap_or_default()
        } else {
            profile.email
        };

        Ok(Principal {
            uid: identity.uid,
            role: profile.role,
            email,
            name: profile.name,
        })
    }
}
