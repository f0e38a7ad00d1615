/// can_access
///
/// The access predicate shared by the route guard and any caller that needs an
/// ad hoc permission check. Both sides are trimmed and lower-cased the same way
/// `RouteMap::resolve_route` normalizes its input, and only exact membership
/// counts: `"admin"` does not grant `"administrator"`.
///
/// Returns `false` when no role is known or the role is blank.
pub fn can_access<S: AsRef<str>>(role: Option<&str>, allowed_roles: &[S]) -> bool {
    let Some(role) = role else {
        return false;
    };

    let role = role.trim().to_lowercase();
    if role.is_empty() {
        return false;
    }

    allowed_roles
        .iter()
        .any(|allowed| allowed.as_ref().trim().to_lowercase() == role)
}
