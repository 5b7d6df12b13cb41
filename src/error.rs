// Error handling module
// Defines error types and HTTP response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Tool names a caller can use to recover from `AuthenticationRequired`
pub const AUTH_ACTIONS: [&str; 2] = ["authenticate_user", "set_token"];

/// Errors that can occur while serving a tool call
#[derive(Error, Debug)]
pub enum ApiError {
    /// No credential source produced a session; recoverable by an explicit
    /// authentication action
    #[error("{0}")]
    AuthenticationRequired(String),

    /// Upstream rejected a username/password pair or a supplied token
    #[error("{0}")]
    InvalidCredentials(String),

    /// Upstream refused sign-in because of the account state
    #[error("{0}")]
    AccountDisabled(String),

    /// Upstream unreachable (connection refused, DNS, timeout)
    #[error("Cannot connect to Jellyfin server at {endpoint} ({reason})")]
    Connectivity { endpoint: String, reason: String },

    /// Token accepted but no user id could be determined for it
    #[error("{0}")]
    IdentityUnresolved(String),

    /// Any other non-success response from Jellyfin
    #[error("Jellyfin API error: {status} - {message}")]
    Upstream { status: u16, message: String },

    /// Request validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Tool name not known to the dispatcher
    #[error("Unknown tool: {0}")]
    UnknownOperation(String),

    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Stable machine-readable error type, used in responses and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::AuthenticationRequired(_) => "authentication_required",
            ApiError::InvalidCredentials(_) => "invalid_credentials",
            ApiError::AccountDisabled(_) => "account_disabled",
            ApiError::Connectivity { .. } => "connectivity_failure",
            ApiError::IdentityUnresolved(_) => "identity_unresolved",
            ApiError::Upstream { .. } => "upstream_error",
            ApiError::ValidationError(_) => "validation_error",
            ApiError::UnknownOperation(_) => "unknown_tool",
            ApiError::NotFound(_) => "not_found",
            ApiError::ConfigError(_) => "config_error",
            ApiError::Internal(_) => "internal_error",
        }
    }

    /// True for the control-flow signal, false for genuine failures
    pub fn is_authentication_required(&self) -> bool {
        matches!(self, ApiError::AuthenticationRequired(_))
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::AuthenticationRequired(_) | ApiError::InvalidCredentials(_) => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::AccountDisabled(_) => StatusCode::FORBIDDEN,
            ApiError::Connectivity { .. } => StatusCode::BAD_GATEWAY,
            ApiError::IdentityUnresolved(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
            ApiError::UnknownOperation(_) | ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ConfigError(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_type = self.kind();

        let body = match &self {
            ApiError::AuthenticationRequired(msg) => json!({
                "error": {
                    "message": msg,
                    "type": error_type,
                    "actions": AUTH_ACTIONS,
                }
            }),
            ApiError::Connectivity { endpoint, .. } => json!({
                "error": {
                    "message": self.to_string(),
                    "type": error_type,
                    "endpoint": endpoint,
                }
            }),
            ApiError::Internal(err) => {
                tracing::error!("Internal error: {:?}", err);
                json!({
                    "error": {
                        "message": "Internal server error",
                        "type": error_type,
                    }
                })
            }
            other => json!({
                "error": {
                    "message": other.to_string(),
                    "type": error_type,
                }
            }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API operations
pub type Result<T> = std::result::Result<T, ApiError>;
