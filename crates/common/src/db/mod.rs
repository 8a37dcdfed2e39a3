//! User/school store for SchoolBridge
//!
//! Provides:
//! - The `UserStore` contract consumed by the gateway and session registry
//! - SeaORM entity models and a Postgres-backed repository
//! - An in-memory store for development and tests
//! - Connection pool management

pub mod models;
mod memory;
mod repository;

pub use memory::MemoryStore;
pub use repository::Repository;

use crate::config::DatabaseConfig;
use crate::errors::{AppError, Result};
use crate::school::{AuthData, ChildrenMap};
use async_trait::async_trait;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Store-level failures. `NotFound` is kept apart from hard failures so
/// callers can pick a default (e.g. an unknown user is newly permitted).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Corrupt record: {message}")]
    Corrupt { message: String },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Persistence of credentials, permissions and per-task status
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Stored school descriptor and portal credentials of a user
    async fn user_auth_data(&self, username: &str, school_id: i64) -> StoreResult<AuthData>;

    /// Whether every user of the school may use the service
    async fn school_permission(&self, school_id: i64) -> StoreResult<bool>;

    /// Whether this particular user may use the service
    async fn user_permission(&self, username: &str, school_id: i64) -> StoreResult<bool>;

    /// Create or refresh a user after a successful portal sign-in
    async fn update_user(
        &self,
        username: &str,
        password: &str,
        is_parent: bool,
        school_id: i64,
        children: &ChildrenMap,
    ) -> StoreResult<()>;

    /// Assignment ids the user marked as done
    async fn done_tasks(&self, username: &str, school_id: i64) -> StoreResult<HashSet<i64>>;

    /// Mark or unmark an assignment as done
    async fn set_task_done(
        &self,
        username: &str,
        school_id: i64,
        assignment_id: i64,
        done: bool,
    ) -> StoreResult<()>;

    /// Check connectivity
    async fn ping(&self) -> StoreResult<()>;
}

/// Access rule: a permitted school admits everyone; otherwise the user's own
/// flag decides, and a user the store has never seen is admitted.
pub async fn check_access(store: &dyn UserStore, username: &str, school_id: i64) -> Result<bool> {
    let school_permitted = match store.school_permission(school_id).await {
        Ok(permitted) => permitted,
        Err(e) if e.is_not_found() => return Err(AppError::UnknownSchool { id: school_id }),
        Err(e) => return Err(e.into()),
    };
    if school_permitted {
        return Ok(true);
    }

    match store.user_permission(username, school_id).await {
        Ok(permitted) => Ok(permitted),
        Err(e) if e.is_not_found() => {
            tracing::debug!(username, school_id, "Unknown user, treating as permitted");
            Ok(true)
        }
        Err(e) => Err(e.into()),
    }
}

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    pub primary: DatabaseConnection,
}

impl DbPool {
    /// Create a new database pool from configuration
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to database...");

        let mut opts = ConnectOptions::new(&config.url);
        opts
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .sqlx_logging(false);

        let primary = Database::connect(opts)
            .await
            .map_err(|e| AppError::DatabaseConnection {
                message: format!("Failed to connect: {}", e)
            })?;

        info!("Database connection established");

        Ok(Self { primary })
    }

    pub fn conn(&self) -> &DatabaseConnection {
        &self.primary
    }

    /// Ping the database to check connectivity
    pub async fn ping(&self) -> std::result::Result<(), sea_orm::DbErr> {
        use sea_orm::ConnectionTrait;

        self.primary.execute_unprepared("SELECT 1").await?;
        Ok(())
    }
}
