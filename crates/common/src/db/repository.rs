//! Repository pattern for the user/school store
//!
//! Postgres-backed implementation of `UserStore` on top of SeaORM.

use super::{StoreError, StoreResult, UserStore};
use crate::db::models::*;
use crate::db::DbPool;
use crate::school::{AuthData, ChildrenMap, Credentials, SchoolDirectory};
use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};
use std::collections::HashSet;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS schools (
    id          BIGINT PRIMARY KEY,
    permission  BOOLEAN NOT NULL DEFAULT TRUE
);

CREATE TABLE IF NOT EXISTS users (
    id          BIGSERIAL PRIMARY KEY,
    login       TEXT NOT NULL,
    password    TEXT NOT NULL,
    school_id   BIGINT NOT NULL REFERENCES schools (id),
    is_parent   BOOLEAN NOT NULL DEFAULT FALSE,
    permission  BOOLEAN NOT NULL DEFAULT TRUE,
    children    JSONB NOT NULL DEFAULT '{}'::jsonb,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (login, school_id)
);

CREATE TABLE IF NOT EXISTS task_statuses (
    id             BIGSERIAL PRIMARY KEY,
    user_id        BIGINT NOT NULL REFERENCES users (id) ON DELETE CASCADE,
    assignment_id  BIGINT NOT NULL,
    done           BOOLEAN NOT NULL DEFAULT FALSE,
    updated_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (user_id, assignment_id)
);
"#;

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
    schools: SchoolDirectory,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool, schools: SchoolDirectory) -> Self {
        Self { pool, schools }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }

    fn user_not_found(username: &str, school_id: i64) -> StoreError {
        StoreError::NotFound {
            entity: "user",
            key: format!("{}@{}", username, school_id),
        }
    }

    // ========================================================================
    // Schema
    // ========================================================================

    /// Create tables if they do not exist yet
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        self.conn().execute_unprepared(SCHEMA).await?;
        Ok(())
    }

    /// Insert rows for configured schools that the database does not know.
    /// Existing permission flags are left alone.
    pub async fn sync_schools(&self) -> StoreResult<usize> {
        let mut inserted = 0;
        for school in self.schools.list() {
            if SchoolEntity::find_by_id(school.id).one(self.conn()).await?.is_some() {
                continue;
            }
            SchoolActiveModel {
                id: Set(school.id),
                permission: Set(school.permission),
            }
            .insert(self.conn())
            .await?;
            inserted += 1;
        }

        tracing::info!(inserted, total = self.schools.len(), "Schools synchronised");
        Ok(inserted)
    }

    // ========================================================================
    // User Operations
    // ========================================================================

    async fn find_user(&self, username: &str, school_id: i64) -> StoreResult<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Login.eq(username))
            .filter(UserColumn::SchoolId.eq(school_id))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    async fn require_user(&self, username: &str, school_id: i64) -> StoreResult<User> {
        self.find_user(username, school_id)
            .await?
            .ok_or_else(|| Self::user_not_found(username, school_id))
    }
}

#[async_trait]
impl UserStore for Repository {
    async fn user_auth_data(&self, username: &str, school_id: i64) -> StoreResult<AuthData> {
        let school = self.schools.get(school_id).cloned().ok_or_else(|| StoreError::NotFound {
            entity: "school",
            key: school_id.to_string(),
        })?;
        let user = self.require_user(username, school_id).await?;

        Ok(AuthData {
            school,
            credentials: Credentials::new(user.login, user.password),
        })
    }

    async fn school_permission(&self, school_id: i64) -> StoreResult<bool> {
        SchoolEntity::find_by_id(school_id)
            .one(self.conn())
            .await?
            .map(|row| row.permission)
            .ok_or_else(|| StoreError::NotFound {
                entity: "school",
                key: school_id.to_string(),
            })
    }

    async fn user_permission(&self, username: &str, school_id: i64) -> StoreResult<bool> {
        self.require_user(username, school_id)
            .await
            .map(|user| user.permission)
    }

    async fn update_user(
        &self,
        username: &str,
        password: &str,
        is_parent: bool,
        school_id: i64,
        children: &ChildrenMap,
    ) -> StoreResult<()> {
        let now = chrono::Utc::now();
        let children = serde_json::to_value(children).map_err(|e| StoreError::Corrupt {
            message: format!("children map: {}", e),
        })?;

        match self.find_user(username, school_id).await? {
            Some(user) => {
                let mut active: UserActiveModel = user.into();
                active.password = Set(password.to_string());
                active.is_parent = Set(is_parent);
                active.children = Set(children);
                active.updated_at = Set(now.into());
                active.update(self.conn()).await?;
            }
            None => {
                UserActiveModel {
                    login: Set(username.to_string()),
                    password: Set(password.to_string()),
                    school_id: Set(school_id),
                    is_parent: Set(is_parent),
                    permission: Set(true),
                    children: Set(children),
                    created_at: Set(now.into()),
                    updated_at: Set(now.into()),
                    ..Default::default()
                }
                .insert(self.conn())
                .await?;
            }
        }

        tracing::debug!(username, school_id, is_parent, "User updated");
        Ok(())
    }

    async fn done_tasks(&self, username: &str, school_id: i64) -> StoreResult<HashSet<i64>> {
        let user = self.require_user(username, school_id).await?;

        let rows = TaskStatusEntity::find()
            .filter(TaskStatusColumn::UserId.eq(user.id))
            .filter(TaskStatusColumn::Done.eq(true))
            .all(self.conn())
            .await?;

        Ok(rows.into_iter().map(|row| row.assignment_id).collect())
    }

    async fn set_task_done(
        &self,
        username: &str,
        school_id: i64,
        assignment_id: i64,
        done: bool,
    ) -> StoreResult<()> {
        let user = self.require_user(username, school_id).await?;
        let now = chrono::Utc::now();

        let existing = TaskStatusEntity::find()
            .filter(TaskStatusColumn::UserId.eq(user.id))
            .filter(TaskStatusColumn::AssignmentId.eq(assignment_id))
            .one(self.conn())
            .await?;

        match existing {
            Some(row) => {
                let mut active: TaskStatusActiveModel = row.into();
                active.done = Set(done);
                active.updated_at = Set(now.into());
                active.update(self.conn()).await?;
            }
            None => {
                TaskStatusActiveModel {
                    user_id: Set(user.id),
                    assignment_id: Set(assignment_id),
                    done: Set(done),
                    updated_at: Set(now.into()),
                    ..Default::default()
                }
                .insert(self.conn())
                .await?;
            }
        }

        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        self.pool.ping().await.map_err(Into::into)
    }
}
