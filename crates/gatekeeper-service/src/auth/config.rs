use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::Profile;

/// How sessions are read from requests and verified.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the cookie carrying the session token.
    ///
    /// Defaults to `__session`.
    pub cookie_name: String,

    /// Reject sessions that were revoked before they expired.
    ///
    /// Defaults to `true`.
    pub check_revoked: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "__session".to_owned(),
            check_revoked: true,
        }
    }
}

/// A session known to the static identity provider.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct SessionIdentity {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub revoked: bool,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Sessions and profiles served from configuration.
///
/// This backs local deployments and tests. Without this section, admin routes fail with a
/// configuration error.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IdentityConfig {
    /// Session tokens mapped to the identity they were issued for.
    pub sessions: BTreeMap<String, SessionIdentity>,

    /// Profiles keyed by subject id.
    pub profiles: BTreeMap<String, Profile>,
}
