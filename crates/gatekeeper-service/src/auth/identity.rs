use serde::{Deserialize, Serialize};

use super::{Role, VerifyError};

/// The subject of a verified session token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub uid: String,
    /// The email address the identity provider knows for this subject.
    pub email: Option<String>,
}

/// A user's profile, as kept in the profile store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub role: Role,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// Verifies session tokens, usually by delegating to an external identity provider.
#[async_trait::async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Resolves `token` into the identity it was issued for.
    ///
    /// With `check_revoked`, sessions that were revoked before their expiry are rejected.
    async fn verify_session(
        &self,
        token: &str,
        check_revoked: bool,
    ) -> Result<VerifiedIdentity, VerifyError>;
}

/// Looks up user profiles by subject id.
#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    /// Returns the profile of `uid`, or `None` if the user has none.
    async fn load_profile(&self, uid: &str) -> anyhow::Result<Option<Profile>>;
}
