use conf_portal::{
    AppState,
    auth_api::{AuthApiState, RemoteAuthApi},
    config::{AppConfig, Env},
    create_router,
    persistence::{FileSessionPersistence, PersistenceState},
    pricing::TicketCatalog,
    registry::SessionRegistry,
    resolver::RouteMap,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, collaborators, background rehydration of
/// persisted sessions, then the HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast in production)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "conf_portal=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Portal starting in {:?} mode", config.env);

    // 3. Ticket catalog
    let catalog = match &config.ticket_catalog_path {
        Some(path) => TicketCatalog::load(path)
            .await
            .expect("FATAL: Ticket catalog is invalid. Check TICKET_CATALOG_PATH."),
        None => TicketCatalog::default(),
    };

    // 4. Session collaborators
    let persistence =
        Arc::new(FileSessionPersistence::new(&config.session_store_path)) as PersistenceState;
    let auth_api =
        Arc::new(RemoteAuthApi::new(&config.auth_api_url, &config.auth_api_key)) as AuthApiState;
    let registry = SessionRegistry::new();

    // Rehydration runs alongside the server; until it finishes, guarded routes
    // answer 503 instead of redirecting restored users to login.
    {
        let registry = registry.clone();
        let persistence = persistence.clone();
        tokio::spawn(async move {
            registry.rehydrate(persistence.as_ref()).await;
        });
    }

    // 5. Unified State Assembly
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState {
        registry,
        persistence,
        auth_api,
        routes: Arc::new(RouteMap::conference()),
        catalog: Arc::new(catalog),
        config,
    };

    // 6. Router and Server Startup
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind PORTAL_BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly.");
}
