use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session. The login and forbidden views live here
/// because the guard redirects to them; guarding them would loop.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET/POST /auth/login
        // GET is the login entry point the guard sends unauthenticated visitors to;
        // POST performs the credential exchange with the Auth API.
        .route(
            "/auth/login",
            get(handlers::login_page).post(handlers::login),
        )
        // POST /auth/oauth/{provider}/callback
        .route(
            "/auth/oauth/{provider}/callback",
            post(handlers::oauth_callback),
        )
        .route("/auth/refresh", post(handlers::refresh))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/session", get(handlers::get_session))
        // GET /auth/landing
        // Role-to-route resolution: sends the caller to their own workspace.
        .route("/auth/landing", get(handlers::landing))
        .route("/forbidden", get(handlers::forbidden))
        // GET /tickets/{ticket_id}/price?at=...
        .route("/tickets/{ticket_id}/price", get(handlers::ticket_price))
}
