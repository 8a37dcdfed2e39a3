//! SchoolBridge Common Library
//!
//! Shared code for the SchoolBridge gateway and session manager:
//! - Error types and HTTP mapping
//! - Configuration management
//! - School descriptors and portal credentials
//! - User/school store (SeaORM and in-memory)
//! - Local (cookie) session tokens
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod school;

// Re-export commonly used types
pub use auth::{LocalSession, LocalSessionManager};
pub use config::AppConfig;
pub use db::{StoreError, UserStore};
pub use errors::{AppError, Result};
pub use school::{AuthData, ChildrenMap, Credentials, PortalKind, School, SchoolDirectory, Student};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Cookie that carries the local session token
pub const DEFAULT_SESSION_COOKIE: &str = "sessionName";
