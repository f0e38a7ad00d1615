use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::roles::Role;

// --- Session Shapes ---

/// SessionUser
///
/// The authenticated user as returned by the Auth API. Only `id` and `role` are
/// load-bearing for access control; the rest is carried for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SessionUser {
    pub id: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Session
///
/// The authentication context the route guard reads. `loading` is set while
/// persisted state is being restored and is never written to disk.
///
/// A token without a user is a tolerated inconsistency; the guard treats it as
/// not permitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<SessionUser>,
    #[serde(skip)]
    pub loading: bool,
}

impl Session {
    /// The state before rehydration has delivered anything.
    pub fn pending() -> Self {
        Self {
            loading: true,
            ..Self::default()
        }
    }

    pub fn has_token(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn role(&self) -> Option<Role> {
        self.user.as_ref().map(|user| user.role)
    }

    /// True when a token is present but the user object is missing.
    pub fn is_inconsistent(&self) -> bool {
        self.has_token() && self.user.is_none()
    }
}

impl From<AuthPayload> for Session {
    fn from(payload: AuthPayload) -> Self {
        Self {
            access_token: Some(payload.access_token),
            refresh_token: payload.refresh_token,
            user: Some(payload.user),
            loading: false,
        }
    }
}

/// AuthPayload
///
/// Output of a successful login, OAuth exchange or token refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthPayload {
    pub user: SessionUser,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// SessionView
///
/// What the portal exposes about a session over HTTP. Tokens never leave the
/// server.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SessionView {
    pub authenticated: bool,
    pub loading: bool,
    pub user: Option<SessionUser>,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            authenticated: session.has_token() && session.user.is_some(),
            loading: session.loading,
            user: session.user.clone(),
        }
    }
}

// --- Provider Contract ---

/// SessionProvider
///
/// Read side of the session, as seen by the route guard. The guard never writes.
/// `subscribe` hands out a change feed so a mounted guarded region can re-evaluate
/// on logout, refresh or rehydration.
pub trait SessionProvider: Send + Sync {
    fn get_session(&self) -> Session;

    fn subscribe(&self) -> watch::Receiver<Session>;
}

/// SessionStore
///
/// Single-session store backed by a `watch` channel. Clones share the same
/// underlying session; writes use `send_replace`/`send_modify` so they succeed even
/// when nobody is subscribed.
#[derive(Clone)]
pub struct SessionStore {
    tx: Arc<watch::Sender<Session>>,
}

impl SessionStore {
    pub fn new(initial: Session) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    /// A store that reports `loading` until `rehydrate` is called.
    pub fn pending() -> Self {
        Self::new(Session::pending())
    }

    /// Installs the result of a login or OAuth exchange.
    pub fn login(&self, payload: AuthPayload) {
        tracing::debug!(user_id = %payload.user.id, role = %payload.user.role, "Session populated");
        self.tx.send_replace(Session::from(payload));
    }

    /// Replaces tokens after a refresh, keeping the current user unless the
    /// payload carries a newer one.
    pub fn update_tokens(&self, payload: AuthPayload) {
        self.tx.send_modify(|session| {
            session.access_token = Some(payload.access_token);
            if payload.refresh_token.is_some() {
                session.refresh_token = payload.refresh_token;
            }
            session.user = Some(payload.user);
            session.loading = false;
        });
    }

    /// Explicit logout.
    pub fn logout(&self) {
        tracing::debug!("Session cleared by logout");
        self.tx.send_replace(Session::default());
    }

    /// Drops an expired access token, keeping the user and refresh token so the
    /// session can still be refreshed.
    pub fn expire_access_token(&self) {
        self.tx.send_modify(|session| session.access_token = None);
    }

    /// Forced reset, e.g. after a token failed validation or a refresh was refused.
    pub fn reset(&self) {
        tracing::debug!("Session reset");
        self.tx.send_replace(Session::default());
    }

    /// Delivers restored state and clears the loading flag.
    pub fn rehydrate(&self, restored: Option<Session>) {
        let mut session = restored.unwrap_or_default();
        session.loading = false;
        self.tx.send_replace(session);
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(Session::default())
    }
}

impl SessionProvider for SessionStore {
    fn get_session(&self) -> Session {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }
}
