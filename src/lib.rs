use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Access-control core: roles, the role-to-route table, the access predicate and
// the guard state machine.
pub mod access;
pub mod guard;
pub mod navigation;
pub mod resolver;
pub mod roles;

// Session state and its collaborators.
pub mod auth;
pub mod auth_api;
pub mod persistence;
pub mod registry;
pub mod session;

pub mod config;
pub mod error;
pub mod handlers;
pub mod pricing;

// Routing split by access policy (public, guarded workspaces).
pub mod routes;
use routes::{public, workspace};

// --- Public Re-exports ---

pub use access::can_access;
pub use auth_api::{AuthApiState, MockAuthApi, RemoteAuthApi};
pub use config::AppConfig;
pub use guard::{GuardDecision, GuardState, RouteGuard, decide};
pub use persistence::{FileSessionPersistence, MemorySessionPersistence, PersistenceState};
pub use registry::SessionRegistry;
pub use resolver::RouteMap;
pub use roles::Role;
pub use session::{Session, SessionProvider, SessionStore};

/// ApiDoc
///
/// OpenAPI document for the portal, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login_page, handlers::login, handlers::oauth_callback, handlers::refresh,
        handlers::logout, handlers::get_session, handlers::landing, handlers::forbidden,
        handlers::ticket_price, handlers::workspace_dashboard
    ),
    components(
        schemas(
            roles::Role, session::SessionUser, session::SessionView, session::AuthPayload,
            auth_api::LoginRequest, auth_api::OAuthCallback, handlers::LoginEntry,
            handlers::LoginResponse, handlers::ForbiddenPage, handlers::WorkspacePage,
            pricing::PricePhase, pricing::PriceQuote, pricing::PhaseStatus,
            guard::GuardState, error::ErrorBody,
        )
    ),
    tags(
        (name = "conf-portal", description = "Conference portal session and workspace API")
    )
)]
struct ApiDoc;

/// AppState
///
/// The single container of shared services, cloned into every request.
#[derive(Clone)]
pub struct AppState {
    /// Every open browser session.
    pub registry: SessionRegistry,
    /// Durable storage for the registry.
    pub persistence: PersistenceState,
    /// Remote login / OAuth / refresh.
    pub auth_api: AuthApiState,
    /// Role -> workspace path table.
    pub routes: Arc<RouteMap>,
    /// Validated ticket catalog for price-phase lookups.
    pub catalog: Arc<pricing::TicketCatalog>,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for SessionRegistry {
    fn from_ref(app_state: &AppState) -> SessionRegistry {
        app_state.registry.clone()
    }
}

impl FromRef<AppState> for PersistenceState {
    fn from_ref(app_state: &AppState) -> PersistenceState {
        app_state.persistence.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the public and guarded routers, the documentation UI and the
/// observability layers.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS: the portal front end is served from its own origin.
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");
    let guard_config = state.config.guard_config();

    // 2. Routes. Public routes carry no guard; every workspace area carries its
    // own guard layer, built from the shared guard configuration.
    let portal_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(workspace::workspace_routes(state.clone(), guard_config))
        .with_state(state);

    // 3. Request correlation and tracing, outermost so guard redirects are logged
    // under the same request id as the request that caused them.
    //    3a. assign an `x-request-id` when the client sent none
    //    3b. open one span per request, closing it with status and latency
    //    3c. echo the id back on the response
    let observability = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace_span_logger)
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(tower_http::LatencyUnit::Millis),
                ),
        )
        .layer(PropagateRequestIdLayer::new(x_request_id));

    portal_router.layer(observability).layer(cors)
}

/// trace_span_logger
///
/// Span per request, correlated by the `x-request-id` header.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
