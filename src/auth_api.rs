use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{
    error::PortalError,
    roles::Role,
    session::{AuthPayload, SessionUser},
};

/// LoginRequest
///
/// Input payload for `POST /auth/login`. The password is forwarded to the Auth API
/// and never stored or logged here.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// OAuthCallback
///
/// Input payload for `POST /auth/oauth/{provider}/callback`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct OAuthCallback {
    pub code: String,
    #[serde(default)]
    pub redirect_uri: Option<String>,
}

/// AuthApi
///
/// The remote authentication collaborator. Every successful call yields the same
/// payload shape, which is what populates a session.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, request: &LoginRequest) -> Result<AuthPayload, PortalError>;

    async fn exchange_oauth(
        &self,
        provider: &str,
        callback: &OAuthCallback,
    ) -> Result<AuthPayload, PortalError>;

    async fn refresh(&self, refresh_token: &str) -> Result<AuthPayload, PortalError>;
}

pub type AuthApiState = Arc<dyn AuthApi>;

// --- Remote Implementation ---

#[derive(Deserialize)]
struct RemoteUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

#[derive(Deserialize)]
struct RemoteAuthResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    user: RemoteUser,
}

impl From<RemoteAuthResponse> for AuthPayload {
    fn from(response: RemoteAuthResponse) -> Self {
        // Role normalization happens here, at the boundary.
        let role = response
            .user
            .role
            .as_deref()
            .map(Role::normalize)
            .unwrap_or(Role::Guest);

        AuthPayload {
            user: SessionUser {
                id: response.user.id,
                role,
                email: response.user.email,
                name: response.user.name,
            },
            access_token: response.access_token,
            refresh_token: response.refresh_token,
        }
    }
}

/// RemoteAuthApi
///
/// HTTP client for the conference API's auth endpoints.
#[derive(Clone)]
pub struct RemoteAuthApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RemoteAuthApi {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    async fn post_token(&self, path: &str, body: serde_json::Value) -> Result<AuthPayload, PortalError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PortalError::Upstream(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::BAD_REQUEST || status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(PortalError::InvalidCredentials);
        }
        if !status.is_success() {
            return Err(PortalError::Upstream(format!("{} returned {}", path, status)));
        }

        let parsed = response
            .json::<RemoteAuthResponse>()
            .await
            .map_err(|e| PortalError::Upstream(e.to_string()))?;

        Ok(parsed.into())
    }
}

#[async_trait]
impl AuthApi for RemoteAuthApi {
    async fn login(&self, request: &LoginRequest) -> Result<AuthPayload, PortalError> {
        self.post_token(
            "/auth/v1/token?grant_type=password",
            serde_json::json!({ "email": request.email, "password": request.password }),
        )
        .await
    }

    async fn exchange_oauth(
        &self,
        provider: &str,
        callback: &OAuthCallback,
    ) -> Result<AuthPayload, PortalError> {
        self.post_token(
            "/auth/v1/token?grant_type=authorization_code",
            serde_json::json!({
                "provider": provider,
                "code": callback.code,
                "redirect_uri": callback.redirect_uri,
            }),
        )
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthPayload, PortalError> {
        self.post_token(
            "/auth/v1/token?grant_type=refresh_token",
            serde_json::json!({ "refresh_token": refresh_token }),
        )
        .await
    }
}

// --- Mock Implementation ---

/// MockAuthApi
///
/// In-memory Auth API. Accounts are registered up front; tokens are whatever the
/// caller supplies through `with_token_minter`, so tests can mint real JWTs.
#[derive(Default)]
pub struct MockAuthApi {
    accounts: HashMap<String, (String, SessionUser)>,
    oauth_codes: HashMap<String, SessionUser>,
    refresh_tokens: HashMap<String, SessionUser>,
    token_for: Option<Arc<dyn Fn(&SessionUser) -> String + Send + Sync>>,
    pub should_fail: bool,
}

impl MockAuthApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn with_account(mut self, email: &str, password: &str, user: SessionUser) -> Self {
        self.accounts
            .insert(email.to_string(), (password.to_string(), user));
        self
    }

    pub fn with_oauth_code(mut self, code: &str, user: SessionUser) -> Self {
        self.oauth_codes.insert(code.to_string(), user);
        self
    }

    pub fn with_refresh_token(mut self, token: &str, user: SessionUser) -> Self {
        self.refresh_tokens.insert(token.to_string(), user);
        self
    }

    pub fn with_token_minter(
        mut self,
        minter: impl Fn(&SessionUser) -> String + Send + Sync + 'static,
    ) -> Self {
        self.token_for = Some(Arc::new(minter));
        self
    }

    /// Simulated outage, checked before any lookup like a failed connection would be.
    fn check(&self) -> Result<(), PortalError> {
        if self.should_fail {
            return Err(PortalError::Upstream(
                "Mock Auth Error: Simulation requested".to_string(),
            ));
        }
        Ok(())
    }

    fn issue(&self, user: &SessionUser) -> Result<AuthPayload, PortalError> {
        let access_token = match &self.token_for {
            Some(minter) => (minter.as_ref())(user),
            None => format!("mock-access-{}", user.id),
        };

        Ok(AuthPayload {
            user: user.clone(),
            access_token,
            refresh_token: Some(format!("mock-refresh-{}", user.id)),
        })
    }
}

#[async_trait]
impl AuthApi for MockAuthApi {
    async fn login(&self, request: &LoginRequest) -> Result<AuthPayload, PortalError> {
        self.check()?;
        match self.accounts.get(&request.email) {
            Some((password, user)) if *password == request.password => self.issue(user),
            _ => Err(PortalError::InvalidCredentials),
        }
    }

    async fn exchange_oauth(
        &self,
        _provider: &str,
        callback: &OAuthCallback,
    ) -> Result<AuthPayload, PortalError> {
        self.check()?;
        match self.oauth_codes.get(&callback.code) {
            Some(user) => self.issue(user),
            None => Err(PortalError::InvalidCredentials),
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthPayload, PortalError> {
        self.check()?;
        let user = self
            .refresh_tokens
            .get(refresh_token)
            .cloned()
            .or_else(|| {
                // Tokens issued by `issue` embed the user id.
                let id = refresh_token.strip_prefix("mock-refresh-")?;
                self.accounts
                    .values()
                    .map(|(_, user)| user)
                    .chain(self.oauth_codes.values())
                    .find(|user| user.id == id)
                    .cloned()
            })
            .ok_or(PortalError::InvalidCredentials)?;
        self.issue(&user)
    }
}
