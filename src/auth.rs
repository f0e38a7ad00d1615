use axum::{
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    persistence::PersistenceState,
    registry::SessionRegistry,
    session::{Session, SessionProvider},
};

/// Name of the cookie carrying the session id.
pub const SESSION_COOKIE: &str = "portal_sid";

/// Claims
///
/// The subset of the access token payload the portal checks. Tokens are issued by
/// the Auth API and signed with the shared secret.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user id as known to the Auth API.
    pub sub: String,
    /// Expiration Time (exp): the token is rejected after this timestamp.
    pub exp: usize,
    /// Issued At (iat).
    pub iat: usize,
}

/// TokenStatus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    Live,
    Expired,
    Invalid,
}

/// check_token
///
/// Validates signature and expiry of an access token.
pub fn check_token(token: &str, secret: &str) -> TokenStatus {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    match decode::<Claims>(token, &decoding_key, &validation) {
        Ok(_) => TokenStatus::Live,
        Err(e) => match e.kind() {
            ErrorKind::ExpiredSignature => TokenStatus::Expired,
            _ => TokenStatus::Invalid,
        },
    }
}

/// session_id
///
/// Reads the `portal_sid` cookie. Malformed ids are treated as absent.
pub fn session_id(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

/// `Set-Cookie` value binding the browser to a session.
pub fn session_cookie(sid: Uuid) -> String {
    format!("{SESSION_COOKIE}={sid}; Path=/; HttpOnly; SameSite=Lax")
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// PortalSession Extractor Result
///
/// The session as the route guard and handlers see it for one request. `sid` is
/// the cookie value when it named a live registry entry.
#[derive(Debug, Clone)]
pub struct PortalSession {
    pub sid: Option<Uuid>,
    pub session: Session,
}

/// PortalSession Extractor Implementation
///
/// 1. Dependency Resolution: registry, persistence and configuration from state.
/// 2. Cookie Lookup: resolve `portal_sid` to a registry entry.
/// 3. Token Validation: an expired access token is dropped (the refresh token
///    survives). A forged one evicts the whole session and the eviction is
///    persisted. Either way the guard then evaluates the session as
///    unauthenticated.
///
/// Never rejects: absence of a session is a guard decision, not an extraction error.
impl<S> FromRequestParts<S> for PortalSession
where
    S: Send + Sync,
    SessionRegistry: FromRef<S>,
    PersistenceState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // 1. Dependency Resolution
        let registry = SessionRegistry::from_ref(state);
        let persistence = PersistenceState::from_ref(state);
        let config = AppConfig::from_ref(state);

        // 2. Cookie Lookup
        let sid = session_id(&parts.headers).filter(|sid| registry.get(sid).is_some());
        let session = registry.session_for(sid.as_ref());

        if session.loading || !session.has_token() {
            return Ok(PortalSession { sid, session });
        }

        // 3. Token Validation
        let token = session.access_token.as_deref().unwrap_or_default();
        let store = sid.as_ref().and_then(|sid| registry.get(sid));
        match (check_token(token, &config.jwt_secret), store) {
            (TokenStatus::Live, _) => Ok(PortalSession { sid, session }),
            (TokenStatus::Expired, Some(store)) => {
                tracing::info!("Access token expired, dropping it from the session");
                store.expire_access_token();
                Ok(PortalSession {
                    sid,
                    session: store.get_session(),
                })
            }
            (status, _) => {
                tracing::info!(?status, "Access token rejected, discarding session");
                if let Some(sid) = sid {
                    registry.discard(&sid);
                    registry.persist(persistence.as_ref()).await;
                }
                Ok(PortalSession {
                    sid: None,
                    session: Session::default(),
                })
            }
        }
    }
}
