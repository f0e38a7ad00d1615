use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use utoipa::ToSchema;

/// PortalError
///
/// Failures raised while serving a request: Auth API calls, session lookups,
/// catalog lookups and session persistence. Guard outcomes are never errors and
/// do not appear here. An invalid ticket catalog stops startup instead.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("no active session")]
    NoSession,

    #[error("auth service error: {0}")]
    Upstream(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("session persistence error: {0}")]
    Persistence(String),
}

impl PortalError {
    pub fn status(&self) -> StatusCode {
        match self {
            PortalError::InvalidCredentials | PortalError::NoSession => StatusCode::UNAUTHORIZED,
            PortalError::Upstream(_) => StatusCode::BAD_GATEWAY,
            PortalError::NotFound(_) => StatusCode::NOT_FOUND,
            PortalError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            PortalError::InvalidCredentials => "INVALID_CREDENTIALS",
            PortalError::NoSession => "NO_SESSION",
            PortalError::Upstream(_) => "UPSTREAM_ERROR",
            PortalError::NotFound(_) => "NOT_FOUND",
            PortalError::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }
}

/// ErrorBody
///
/// JSON body returned for every `PortalError`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl IntoResponse for PortalError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        let body = ErrorBody {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
