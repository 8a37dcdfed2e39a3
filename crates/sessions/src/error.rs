//! Error types for remote portal sessions
//!
//! `PortalError` is what an adapter reports for a single call. `SessionError`
//! is what the registry and orchestrator surface to the HTTP layer.

use schoolbridge_common::{AppError, StoreError};
use thiserror::Error;

/// Outcome of a failed portal call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortalError {
    /// The portal rejected the credentials
    #[error("Portal rejected credentials: {message}")]
    Auth { message: String },

    /// The portal no longer honours the held session token
    #[error("Remote session is no longer accepted by the portal")]
    LoggedOut,

    /// Network failure, timeout or unexpected portal response
    #[error("Portal request failed: {message}")]
    Remote { message: String },
}

impl PortalError {
    pub fn auth(message: impl Into<String>) -> Self {
        PortalError::Auth { message: message.into() }
    }

    pub fn remote(message: impl Into<String>) -> Self {
        PortalError::Remote { message: message.into() }
    }

    pub fn is_logged_out(&self) -> bool {
        matches!(self, PortalError::LoggedOut)
    }

    /// Short label used as a metrics outcome
    pub fn kind(&self) -> &'static str {
        match self {
            PortalError::Auth { .. } => "auth_error",
            PortalError::LoggedOut => "logged_out",
            PortalError::Remote { .. } => "remote_error",
        }
    }
}

impl From<reqwest::Error> for PortalError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PortalError::remote("request timed out")
        } else {
            PortalError::remote(err.to_string())
        }
    }
}

/// Why a remote session could not be established
#[derive(Error, Debug)]
pub enum CreationFailure {
    #[error("credentials lookup failed: {0}")]
    Credentials(#[source] StoreError),

    #[error("login failed: {0}")]
    Login(#[source] PortalError),
}

/// Errors surfaced by the registry and orchestrator
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Could not establish remote session: {0}")]
    Creation(#[from] CreationFailure),

    #[error(transparent)]
    Portal(#[from] PortalError),
}

impl SessionError {
    pub fn is_logged_out(&self) -> bool {
        matches!(self, SessionError::Portal(PortalError::LoggedOut))
    }

    pub fn is_creation(&self) -> bool {
        matches!(self, SessionError::Creation(_))
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Creation(CreationFailure::Credentials(e)) if e.is_not_found() => {
                AppError::Unauthorized {
                    message: "No stored portal credentials for this session".to_string(),
                }
            }
            SessionError::Creation(CreationFailure::Credentials(e)) => e.into(),
            SessionError::Creation(CreationFailure::Login(PortalError::Auth { .. }))
            | SessionError::Portal(PortalError::Auth { .. }) => AppError::PortalAuth,
            SessionError::Creation(CreationFailure::Login(e)) => AppError::upstream(e.to_string()),
            SessionError::Portal(e) => AppError::upstream(e.to_string()),
        }
    }
}
