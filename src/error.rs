use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict error: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Create a new validation error
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new authentication error
    pub fn authentication<T: Into<String>>(msg: T) -> Self {
        Self::Authentication(msg.into())
    }

    /// Create a new authorization error
    pub fn authorization<T: Into<String>>(msg: T) -> Self {
        Self::Authorization(msg.into())
    }

    /// Create a new not found error
    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new conflict error
    pub fn conflict<T: Into<String>>(msg: T) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a new internal error
    pub fn internal<T: Into<String>>(msg: T) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ApiError::Authorization(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Database(_)
            | ApiError::Migration(_)
            | ApiError::Config(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

const GENERIC_SERVER_ERROR: &str = "An unexpected error occurred";

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4();
        let status = self.status_code();

        let (error_message, error_code) = match self {
            ApiError::Validation(ref msg) => {
                tracing::warn!(error_id = %error_id, error = %msg, "validation error occurred");
                (msg.as_str(), "VALIDATION_ERROR")
            }
            ApiError::Authentication(ref msg) => {
                tracing::warn!(error_id = %error_id, error = %msg, "authentication error occurred");
                (msg.as_str(), "AUTHENTICATION_ERROR")
            }
            ApiError::Authorization(ref msg) => {
                tracing::warn!(error_id = %error_id, error = %msg, "authorization error occurred");
                (msg.as_str(), "AUTHORIZATION_ERROR")
            }
            ApiError::NotFound(ref msg) => {
                tracing::info!(error_id = %error_id, error = %msg, "resource not found");
                (msg.as_str(), "NOT_FOUND")
            }
            ApiError::Conflict(ref msg) => {
                tracing::warn!(error_id = %error_id, error = %msg, "conflict error occurred");
                (msg.as_str(), "CONFLICT_ERROR")
            }
            ApiError::Database(ref err) => {
                tracing::error!(error_id = %error_id, error = %err, "database error occurred");
                (GENERIC_SERVER_ERROR, "DATABASE_ERROR")
            }
            ApiError::Migration(ref err) => {
                tracing::error!(error_id = %error_id, error = %err, "database migration error occurred");
                (GENERIC_SERVER_ERROR, "MIGRATION_ERROR")
            }
            ApiError::Config(ref err) => {
                tracing::error!(error_id = %error_id, error = %err, "configuration error occurred");
                (GENERIC_SERVER_ERROR, "CONFIG_ERROR")
            }
            ApiError::Internal(ref msg) => {
                tracing::error!(error_id = %error_id, error = %msg, "internal server error occurred");
                (GENERIC_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let body = Json(json!({
            "success": false,
            "error": error_message,
            "code": error_code,
            "error_id": error_id,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;
