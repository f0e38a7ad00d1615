use axum::{
    Extension, Json, Router,
    extract::{FromRequestParts, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use serde_json::json;
use std::sync::Arc;

use crate::{
    AppState,
    auth::PortalSession,
    guard::{GuardConfig, GuardDecision, GuardState, RouteGuard},
    handlers::{self, WorkspaceArea},
    roles::Role,
};

/// workspace_areas
///
/// Every protected area of the portal and who may enter it. Admins reach all
/// areas; attendee pages are open to any signed-in role except guests.
pub fn workspace_areas() -> Vec<WorkspaceArea> {
    vec![
        WorkspaceArea {
            name: "admin",
            allowed_roles: vec![Role::Admin],
        },
        WorkspaceArea {
            name: "organizer",
            allowed_roles: vec![Role::Admin, Role::Organizer],
        },
        WorkspaceArea {
            name: "collaborator",
            allowed_roles: vec![Role::Admin, Role::Organizer, Role::Collaborator],
        },
        WorkspaceArea {
            name: "reviewer",
            allowed_roles: vec![Role::Admin, Role::Reviewer],
        },
        WorkspaceArea {
            name: "speaker",
            allowed_roles: vec![Role::Admin, Role::Organizer, Role::Speaker],
        },
        WorkspaceArea {
            name: "attendee",
            allowed_roles: vec![
                Role::Admin,
                Role::Organizer,
                Role::Collaborator,
                Role::Reviewer,
                Role::Speaker,
                Role::Attendee,
            ],
        },
    ]
}

/// GuardGate
///
/// State handed to the guard middleware: the shared application state (to resolve
/// the session) and the area's guard.
#[derive(Clone)]
pub struct GuardGate {
    pub app: AppState,
    pub guard: Arc<RouteGuard>,
}

/// Response for a guard that is still waiting on rehydration.
pub fn pending_response() -> Response {
    let mut response = (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({ "state": GuardState::Unknown })),
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
    response
}

/// guard_middleware
///
/// Runs the area's guard for every request and turns the decision into HTTP:
/// `Authorized` passes through to the handler, `RedirectTo` becomes a 303, and
/// `Pending` a 503 with `Retry-After`.
pub async fn guard_middleware(
    State(gate): State<GuardGate>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    let PortalSession { session, .. } = PortalSession::from_request_parts(&mut parts, &gate.app)
        .await
        .unwrap_or_else(|never| match never {});

    let outcome = gate.guard.evaluate(&session);
    match outcome.decision {
        GuardDecision::Authorized => next.run(Request::from_parts(parts, body)).await,
        GuardDecision::RedirectTo(path) => {
            tracing::debug!(
                uri = %parts.uri,
                state = ?outcome.state,
                target_path = %path,
                "Guard redirect"
            );
            Redirect::to(&path).into_response()
        }
        GuardDecision::Pending => {
            tracing::debug!(uri = %parts.uri, "Guard holding until sessions are restored");
            pending_response()
        }
    }
}

/// Workspace Router Module
///
/// Mounts `/{area}/dashboard` for every area, each behind its own guard.
pub fn workspace_routes(state: AppState, guard_config: GuardConfig) -> Router<AppState> {
    workspace_areas()
        .into_iter()
        .fold(Router::new(), |router, area| {
            let gate = GuardGate {
                app: state.clone(),
                guard: Arc::new(RouteGuard::new(
                    area.allowed_roles.clone(),
                    guard_config.clone(),
                )),
            };

            let area_router = Router::new()
                .route(
                    &format!("/{}/dashboard", area.name),
                    get(handlers::workspace_dashboard),
                )
                .layer(Extension(area))
                .route_layer(middleware::from_fn_with_state(gate, guard_middleware));

            router.merge(area_router)
        })
}
