use serde::{Deserialize, Deserializer, Serialize};
use std::{fmt, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;

/// Role
///
/// The closed set of workspace roles known to the portal. Role strings arriving
/// from the Auth API are normalized at the boundary (see `Role::normalize`), so the
/// rest of the crate never compares free-form role text.
///
/// Serialized lower-case. Deserialization is lenient: an unknown role in a stored
/// session or API payload becomes `Guest` instead of failing the whole document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    Organizer,
    Collaborator,
    Reviewer,
    Speaker,
    Attendee,
    Guest,
}

/// Every role, in privilege order. Useful for building allow-lists.
pub const ALL_ROLES: [Role; 7] = [
    Role::Admin,
    Role::Organizer,
    Role::Collaborator,
    Role::Reviewer,
    Role::Speaker,
    Role::Attendee,
    Role::Guest,
];

/// UnknownRole
///
/// Returned by the strict `FromStr` parse when the input names no known role.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl Role {
    /// The canonical lower-case identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Organizer => "organizer",
            Role::Collaborator => "collaborator",
            Role::Reviewer => "reviewer",
            Role::Speaker => "speaker",
            Role::Attendee => "attendee",
            Role::Guest => "guest",
        }
    }

    /// parse
    ///
    /// Case-insensitive lookup. Surrounding whitespace is ignored.
    pub fn parse(raw: &str) -> Option<Role> {
        let needle = raw.trim().to_lowercase();
        ALL_ROLES.into_iter().find(|role| role.as_str() == needle)
    }

    /// normalize
    ///
    /// Boundary conversion for role strings coming from upstream services.
    /// Anything unrecognised is demoted to `Guest`.
    pub fn normalize(raw: &str) -> Role {
        Role::parse(raw).unwrap_or_else(|| {
            tracing::warn!(role = %raw, "Unrecognised role from upstream, treating as guest");
            Role::Guest
        })
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::parse(s).ok_or_else(|| UnknownRole(s.to_string()))
    }
}

impl From<String> for Role {
    fn from(raw: String) -> Self {
        Role::normalize(&raw)
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Role::normalize(&raw))
    }
}
