/// Router Module Index
///
/// Splits the portal's routes by access policy. Access control is applied at the
/// router level (via Axum layers), so a handler cannot be mounted in a protected
/// area without its guard.

/// Routes open to every visitor: health, auth flows, the forbidden view and
/// ticket pricing.
pub mod public;

/// Workspace areas, each wrapped in a route guard with its own allow-list.
pub mod workspace;
