use std::collections::BTreeMap;

use chrono::Utc;

use super::{
    IdentityVerifier, Profile, ProfileStore, SessionIdentity, VerifiedIdentity, VerifyError,
};

/// An [`IdentityVerifier`] with a fixed set of sessions.
#[derive(Clone, Debug, Default)]
pub struct StaticIdentityVerifier {
    sessions: BTreeMap<String, SessionIdentity>,
}

impl StaticIdentityVerifier {
    pub fn new(sessions: BTreeMap<String, SessionIdentity>) -> Self {
        Self { sessions }
    }
}

#[async_trait::async_trait]
impl IdentityVerifier for StaticIdentityVerifier {
    async fn verify_session(
        &self,
        token: &str,
        check_revoked: bool,
    ) -> Result<VerifiedIdentity, VerifyError> {
        let session = self.sessions.get(token).ok_or(VerifyError::Invalid)?;

        if session
            .expires_at
            .is_some_and(|expires_at| expires_at <= Utc::now())
        {
            return Err(VerifyError::Expired);
        }
        if check_revoked && session.revoked {
            return Err(VerifyError::Revoked);
        }

        Ok(VerifiedIdentity {
            uid: session.uid.clone(),
            email: session.email.clone(),
        })
    }
}

/// A [`ProfileStore`] with a fixed set of profiles.
#[derive(Clone, Debug, Default)]
pub struct StaticProfileStore {
    profiles: BTreeMap<String, Profile>,
}

impl StaticProfileStore {
    pub fn new(profiles: BTreeMap<String, Profile>) -> Self {
        Self { profiles }
    }
}

#[async_trait::async_trait]
impl ProfileStore for StaticProfileStore {
    async fn load_profile(&self, uid: &str) -> anyhow::Result<Option<Profile>> {
        Ok(self.profiles.get(uid).cloned())
    }
}
