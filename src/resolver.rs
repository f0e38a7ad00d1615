use std::collections::HashMap;

use crate::roles::Role;

/// Landing path used when a role has no dedicated workspace.
pub const DEFAULT_LANDING_PATH: &str = "/";

/// RouteMap
///
/// Immutable table from role identifier to the canonical workspace path, plus the
/// fallback used for absent or unmapped roles. Keys are stored lower-cased so that
/// lookups stay case-insensitive regardless of how the table was built.
#[derive(Debug, Clone)]
pub struct RouteMap {
    routes: HashMap<String, String>,
    default_path: String,
}

impl RouteMap {
    pub fn new<I, K, V>(entries: I, default_path: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let routes = entries
            .into_iter()
            .map(|(role, path)| (role.as_ref().to_lowercase(), path.into()))
            .collect();

        Self {
            routes,
            default_path: default_path.into(),
        }
    }

    /// conference
    ///
    /// The portal's workspace layout. Guests have no workspace of their own and
    /// land on the default path.
    pub fn conference() -> Self {
        Self::new(
            [
                (Role::Admin, "/admin/dashboard"),
                (Role::Organizer, "/organizer/dashboard"),
                (Role::Collaborator, "/collaborator/dashboard"),
                (Role::Reviewer, "/reviewer/dashboard"),
                (Role::Speaker, "/speaker/dashboard"),
                (Role::Attendee, "/attendee/dashboard"),
            ]
            .map(|(role, path)| (role.as_str(), path)),
            DEFAULT_LANDING_PATH,
        )
    }

    /// resolve_route
    ///
    /// Total over its input: empty, absent and unknown roles all yield the
    /// default path.
    pub fn resolve_route(&self, role: Option<&str>) -> &str {
        match role.map(str::trim) {
            Some(role) if !role.is_empty() => self
                .routes
                .get(&role.to_lowercase())
                .map(String::as_str)
                .unwrap_or(&self.default_path),
            _ => &self.default_path,
        }
    }

    pub fn route_for(&self, role: Role) -> &str {
        self.resolve_route(Some(role.as_str()))
    }

    pub fn default_path(&self) -> &str {
        &self.default_path
    }
}

impl Default for RouteMap {
    fn default() -> Self {
        Self::conference()
    }
}
