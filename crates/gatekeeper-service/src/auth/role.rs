use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The role of a user, from least to most privileged.
///
/// Roles form a total order. A user passes a role gate when their role ranks at least as high as
/// the required one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Member,
    Editor,
    Admin,
    /// Can never be locked out by deactivation.
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Member, Role::Editor, Role::Admin, Role::SuperAdmin];

    /// The position of this role in the hierarchy, starting at `0` for [`Role::Member`].
    pub fn rank(self) -> u8 {
        match self {
            Role::Member => 0,
            Role::Editor => 1,
            Role::Admin => 2,
            Role::SuperAdmin => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Editor => "editor",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown role `{0}`")]
pub struct ParseRoleError(String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| ParseRoleError(s.to_owned()))
    }
}
