use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    AppState,
    auth::{PortalSession, clear_session_cookie, session_cookie},
    auth_api::{LoginRequest, OAuthCallback},
    error::PortalError,
    guard::LOGIN_PATH,
    pricing::PriceQuote,
    roles::Role,
    session::{AuthPayload, SessionProvider, SessionUser, SessionView},
};

// --- Response Schemas ---

/// LoginEntry
///
/// Describes how to authenticate; served at the login entry point the guard
/// redirects to.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginEntry {
    pub submit_to: String,
    pub oauth_callback: String,
}

/// LoginResponse
///
/// Returned by every flow that opens a session. `redirect_to` is the caller's
/// workspace as resolved from their role.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginResponse {
    pub redirect_to: String,
    pub user: SessionUser,
}

/// ForbiddenPage
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ForbiddenPage {
    pub message: String,
    /// Where the visitor's own role would take them.
    pub home: String,
}

/// WorkspacePage
///
/// Payload of a guarded workspace dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct WorkspacePage {
    pub area: String,
    pub allowed_roles: Vec<Role>,
    pub user: Option<SessionUser>,
}

/// WorkspaceArea
///
/// A protected workspace: URL prefix plus the roles allowed in. Attached to the
/// area's router as an extension so the shared dashboard handler knows where it is.
#[derive(Debug, Clone)]
pub struct WorkspaceArea {
    pub name: &'static str,
    pub allowed_roles: Vec<Role>,
}

/// PriceQuery
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct PriceQuery {
    /// Point in time to quote for; defaults to now.
    pub at: Option<DateTime<Utc>>,
}

// --- Helpers ---

/// Installs an Auth API payload into the caller's session (or a new one) and
/// persists the registry.
async fn establish_session(
    state: &AppState,
    existing: Option<Uuid>,
    payload: AuthPayload,
) -> Response {
    let user = payload.user.clone();
    let sid = match existing.and_then(|sid| state.registry.get(&sid).map(|s| (sid, s))) {
        Some((sid, store)) => {
            store.login(payload);
            sid
        }
        None => state.registry.open_with(payload).0,
    };

    state.registry.persist(state.persistence.as_ref()).await;

    let redirect_to = state.routes.route_for(user.role).to_string();
    tracing::info!(user_id = %user.id, role = %user.role, %redirect_to, "Session opened");

    let mut response = Json(LoginResponse { redirect_to, user }).into_response();
    if let Ok(cookie) = HeaderValue::from_str(&session_cookie(sid)) {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    response
}

// --- Handlers ---

/// login_page
///
/// [Public Route] The login entry point.
#[utoipa::path(
    get,
    path = "/auth/login",
    responses((status = 200, description = "Login entry", body = LoginEntry))
)]
pub async fn login_page() -> Json<LoginEntry> {
    Json(LoginEntry {
        submit_to: LOGIN_PATH.to_string(),
        oauth_callback: "/auth/oauth/{provider}/callback".to_string(),
    })
}

/// login
///
/// [Public Route] Credential login through the Auth API. Reuses the caller's
/// session id when it already has one.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorBody),
        (status = 502, description = "Auth service unavailable", body = crate::error::ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    PortalSession { sid, .. }: PortalSession,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, PortalError> {
    let auth = state.auth_api.login(&payload).await?;
    Ok(establish_session(&state, sid, auth).await)
}

/// oauth_callback
///
/// [Public Route] Completes an OAuth flow by exchanging the authorization code.
#[utoipa::path(
    post,
    path = "/auth/oauth/{provider}/callback",
    params(("provider" = String, Path, description = "OAuth provider, e.g. google")),
    request_body = OAuthCallback,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Code rejected", body = crate::error::ErrorBody)
    )
)]
pub async fn oauth_callback(
    State(state): State<AppState>,
    PortalSession { sid, .. }: PortalSession,
    Path(provider): Path<String>,
    Json(callback): Json<OAuthCallback>,
) -> Result<Response, PortalError> {
    let auth = state.auth_api.exchange_oauth(&provider, &callback).await?;
    Ok(establish_session(&state, sid, auth).await)
}

/// refresh
///
/// [Public Route] Trades the session's refresh token for new tokens. When the Auth
/// API refuses the token, the session is discarded so the next guarded navigation
/// goes to login. An unreachable Auth API leaves the session untouched.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "Refreshed", body = SessionView),
        (status = 401, description = "No session or refresh rejected", body = crate::error::ErrorBody),
        (status = 502, description = "Auth service unavailable, session kept", body = crate::error::ErrorBody)
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    PortalSession { sid, .. }: PortalSession,
) -> Result<Json<SessionView>, PortalError> {
    let (sid, store) = sid
        .and_then(|sid| state.registry.get(&sid).map(|store| (sid, store)))
        .ok_or(PortalError::NoSession)?;

    // The extractor may have dropped an expired access token; the refresh token
    // stays in the store.
    let refresh_token = store
        .get_session()
        .refresh_token
        .ok_or(PortalError::NoSession)?;

    match state.auth_api.refresh(&refresh_token).await {
        Ok(payload) => {
            store.update_tokens(payload);
            state.registry.persist(state.persistence.as_ref()).await;
            Ok(Json(SessionView::from(&store.get_session())))
        }
        Err(PortalError::InvalidCredentials) => {
            tracing::info!(%sid, "Refresh token rejected, discarding session");
            state.registry.discard(&sid);
            state.registry.persist(state.persistence.as_ref()).await;
            Err(PortalError::InvalidCredentials)
        }
        Err(e) => {
            tracing::warn!(%sid, error = %e, "Refresh failed upstream, keeping session");
            Err(e)
        }
    }
}

/// logout
///
/// [Public Route] Drops the session and clears the cookie. Idempotent.
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Logged out"))
)]
pub async fn logout(
    State(state): State<AppState>,
    PortalSession { sid, .. }: PortalSession,
) -> Response {
    if let Some(sid) = sid {
        state.registry.remove(&sid);
        // Purges the file once the last session is gone.
        state.registry.persist(state.persistence.as_ref()).await;
        tracing::info!(%sid, "Session closed");
    }

    let mut response = StatusCode::NO_CONTENT.into_response();
    if let Ok(cookie) = HeaderValue::from_str(&clear_session_cookie()) {
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    response
}

/// get_session
///
/// [Public Route] The caller's session without tokens.
#[utoipa::path(
    get,
    path = "/auth/session",
    responses((status = 200, description = "Current session", body = SessionView))
)]
pub async fn get_session(PortalSession { session, .. }: PortalSession) -> Json<SessionView> {
    Json(SessionView::from(&session))
}

/// landing
///
/// [Public Route] Sends the caller to their workspace, or to login without a
/// session. Holds with 503 while sessions are still being restored.
#[utoipa::path(
    get,
    path = "/auth/landing",
    responses(
        (status = 303, description = "Redirect to workspace or login"),
        (status = 503, description = "Sessions still loading")
    )
)]
pub async fn landing(
    State(state): State<AppState>,
    PortalSession { session, .. }: PortalSession,
) -> Response {
    if session.loading {
        return crate::routes::workspace::pending_response();
    }
    if !session.has_token() {
        return Redirect::to(LOGIN_PATH).into_response();
    }

    let role = session.role().map(|role| role.as_str());
    Redirect::to(state.routes.resolve_route(role)).into_response()
}

/// forbidden
///
/// [Public Route] The not-authorized view the guard redirects to.
#[utoipa::path(
    get,
    path = "/forbidden",
    responses((status = 403, description = "Not authorized", body = ForbiddenPage))
)]
pub async fn forbidden(
    State(state): State<AppState>,
    PortalSession { session, .. }: PortalSession,
) -> (StatusCode, Json<ForbiddenPage>) {
    let role = session.role().map(|role| role.as_str());
    (
        StatusCode::FORBIDDEN,
        Json(ForbiddenPage {
            message: "You do not have access to this workspace.".to_string(),
            home: state.routes.resolve_route(role).to_string(),
        }),
    )
}

/// ticket_price
///
/// [Public Route] The price phase of a ticket at `at` (default: now).
#[utoipa::path(
    get,
    path = "/tickets/{ticket_id}/price",
    params(("ticket_id" = String, Path, description = "Ticket type id"), PriceQuery),
    responses(
        (status = 200, description = "Quote", body = PriceQuote),
        (status = 404, description = "Unknown ticket", body = crate::error::ErrorBody)
    )
)]
pub async fn ticket_price(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
    Query(query): Query<PriceQuery>,
) -> Result<Json<PriceQuote>, PortalError> {
    let ticket = state
        .catalog
        .get(&ticket_id)
        .ok_or_else(|| PortalError::NotFound(format!("ticket {ticket_id}")))?;

    let at = query.at.unwrap_or_else(Utc::now);
    Ok(Json(PriceQuote::for_ticket(ticket, at)))
}

/// workspace_dashboard
///
/// [Guarded Route] Shared dashboard for every workspace area. Only reachable once
/// the area's guard has authorized the caller.
#[utoipa::path(
    get,
    path = "/{area}/dashboard",
    params(("area" = String, Path, description = "admin, organizer, collaborator, reviewer, speaker or attendee")),
    responses(
        (status = 200, description = "Workspace", body = WorkspacePage),
        (status = 303, description = "Redirect to login or forbidden"),
        (status = 503, description = "Sessions still loading")
    )
)]
pub async fn workspace_dashboard(
    Extension(area): Extension<WorkspaceArea>,
    PortalSession { session, .. }: PortalSession,
) -> Json<WorkspacePage> {
    Json(WorkspacePage {
        area: area.name.to_string(),
        allowed_roles: area.allowed_roles,
        user: session.user,
    })
}
