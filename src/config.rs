use std::{env, path::PathBuf};

use crate::guard::{GuardConfig, RehydrationPolicy};

/// AppConfig
///
/// Holds the portal's entire configuration. Immutable once loaded and pulled into
/// handlers through `FromRef`, like every other piece of the shared state.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and which secrets are mandatory.
    pub env: Env,
    // Address the HTTP server binds to.
    pub bind_addr: String,
    // Base URL of the remote conference API's auth service.
    pub auth_api_url: String,
    // API key sent with every Auth API call.
    pub auth_api_key: String,
    // Shared secret used to validate access tokens before the guard sees them.
    pub jwt_secret: String,
    // Where the session snapshot is persisted between restarts.
    pub session_store_path: PathBuf,
    // Optional JSON ticket catalog for price-phase resolution.
    pub ticket_catalog_path: Option<PathBuf>,
    // Whether the guard waits for rehydration or redirects straight away.
    pub rehydration: RehydrationPolicy,
}

/// Env
///
/// Runtime context: pretty logs and fallback secrets locally, JSON logs and
/// mandatory secrets in production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

const LOCAL_JWT_SECRET: &str = "conf-portal-local-development-secret";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_SESSION_STORE: &str = "./data/sessions.json";

impl Default for AppConfig {
    /// default
    ///
    /// Non-panicking configuration for test setup; no environment variables needed.
    fn default() -> Self {
        Self {
            env: Env::Local,
            bind_addr: "127.0.0.1:0".to_string(),
            auth_api_url: "http://localhost:8080".to_string(),
            auth_api_key: String::new(),
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            session_store_path: PathBuf::from(DEFAULT_SESSION_STORE),
            ticket_catalog_path: None,
            rehydration: RehydrationPolicy::AwaitRehydration,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from the environment at startup.
    ///
    /// # Panics
    /// Panics in production when `AUTH_API_URL`, `AUTH_API_KEY` or
    /// `PORTAL_JWT_SECRET` is missing. Starting without them would leave every
    /// protected page unreachable.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").unwrap_or_else(|_| "local".to_string()).as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let bind_addr =
            env::var("PORTAL_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let session_store_path = env::var("SESSION_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_SESSION_STORE));
        let ticket_catalog_path = env::var("TICKET_CATALOG_PATH").ok().map(PathBuf::from);
        let rehydration = match env::var("GUARD_REHYDRATION").ok().as_deref() {
            Some("redirect") => RehydrationPolicy::RedirectImmediately,
            _ => RehydrationPolicy::AwaitRehydration,
        };

        match env {
            Env::Local => Self {
                env: Env::Local,
                bind_addr,
                auth_api_url: env::var("AUTH_API_URL")
                    .unwrap_or_else(|_| "http://localhost:8080".to_string()),
                auth_api_key: env::var("AUTH_API_KEY").unwrap_or_default(),
                jwt_secret: env::var("PORTAL_JWT_SECRET")
                    .unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
                session_store_path,
                ticket_catalog_path,
                rehydration,
            },
            Env::Production => Self {
                env: Env::Production,
                bind_addr,
                auth_api_url: env::var("AUTH_API_URL")
                    .expect("FATAL: AUTH_API_URL required in prod"),
                auth_api_key: env::var("AUTH_API_KEY")
                    .expect("FATAL: AUTH_API_KEY required in prod"),
                jwt_secret: env::var("PORTAL_JWT_SECRET")
                    .expect("FATAL: PORTAL_JWT_SECRET must be set in production."),
                session_store_path,
                ticket_catalog_path,
                rehydration,
            },
        }
    }

    pub fn guard_config(&self) -> GuardConfig {
        GuardConfig {
            rehydration: self.rehydration,
            ..GuardConfig::default()
        }
    }
}
