//! Error types for SchoolBridge services
//!
//! Provides the HTTP boundary error with:
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling
//!
//! Portal failures never leak portal text to clients: every upstream
//! failure is rendered as a generic "upstream unavailable" message.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::StoreError;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    ValidationError,
    InvalidFormat,
    UnknownSchool,

    // Authentication errors
    Unauthorized,
    SessionExpired,
    PortalAuthFailed,

    // Authorization errors
    AccessDenied,

    // Resource errors
    NotFound,

    // Rate limiting
    RateLimited,

    // Database errors
    DatabaseError,
    ConnectionError,

    // External service errors
    UpstreamError,

    // Internal errors
    InternalError,
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    #[error("Unknown school: {id}")]
    UnknownSchool { id: i64 },

    // Authentication errors
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Local session expired or invalid")]
    SessionExpired,

    #[error("School portal rejected the credentials")]
    PortalAuth,

    // Authorization errors
    #[error("Access to the service is not permitted for this account")]
    AccessDenied,

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    // External service errors
    #[error("Upstream portal unavailable")]
    Upstream { detail: String },

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Build an upstream error, keeping the portal detail out of the response
    pub fn upstream(detail: impl Into<String>) -> Self {
        AppError::Upstream { detail: detail.into() }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            AppError::UnknownSchool { .. } => ErrorCode::UnknownSchool,
            AppError::Unauthorized { .. } => ErrorCode::Unauthorized,
            AppError::SessionExpired => ErrorCode::SessionExpired,
            AppError::PortalAuth => ErrorCode::PortalAuthFailed,
            AppError::AccessDenied => ErrorCode::AccessDenied,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::Upstream { .. } => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } |
            AppError::InvalidFormat { .. } |
            AppError::UnknownSchool { .. } => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::Unauthorized { .. } |
            AppError::SessionExpired |
            AppError::PortalAuth => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            AppError::AccessDenied => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Database(_) |
            AppError::DatabaseConnection { .. } |
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if let AppError::Upstream { detail } = &self {
            tracing::error!(
                error = %detail,
                code = ?code,
                status = status.as_u16(),
                "Upstream portal error"
            );
        } else if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details: None,
                request_id: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Unparseable or mistyped request bodies
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidFormat {
            message: rejection.body_text(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, key } => AppError::NotFound {
                resource_type: entity.to_string(),
                id: key,
            },
            StoreError::Database(e) => AppError::Database(e),
            StoreError::Corrupt { message } => AppError::Internal { message },
        }
    }
}
