//! In-memory user/school store
//!
//! Same contract as the Postgres repository; nothing survives a restart.
//! School permissions are seeded from the configured school descriptors.

use super::{StoreError, StoreResult, UserStore};
use crate::school::{AuthData, ChildrenMap, Credentials, SchoolDirectory};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct UserRecord {
    password: String,
    is_parent: bool,
    permission: bool,
    children: ChildrenMap,
    done: HashSet<i64>,
}

type UserKey = (String, i64);

/// Store backed by process memory
pub struct MemoryStore {
    schools: SchoolDirectory,
    school_permissions: RwLock<HashMap<i64, bool>>,
    users: RwLock<HashMap<UserKey, UserRecord>>,
}

impl MemoryStore {
    pub fn new(schools: SchoolDirectory) -> Self {
        let school_permissions = schools
            .list()
            .iter()
            .map(|s| (s.id, s.permission))
            .collect();

        Self {
            schools,
            school_permissions: RwLock::new(school_permissions),
            users: RwLock::new(HashMap::new()),
        }
    }

    fn key(username: &str, school_id: i64) -> UserKey {
        (username.to_string(), school_id)
    }

    fn user_not_found(username: &str, school_id: i64) -> StoreError {
        StoreError::NotFound {
            entity: "user",
            key: format!("{}@{}", username, school_id),
        }
    }

    /// Override the permission flag of an existing user
    pub async fn set_user_permission(&self, username: &str, school_id: i64, permission: bool) -> bool {
        let mut users = self.users.write().await;
        match users.get_mut(&Self::key(username, school_id)) {
            Some(record) => {
                record.permission = permission;
                true
            }
            None => false,
        }
    }

    /// Children map recorded at the last sign-in
    pub async fn children(&self, username: &str, school_id: i64) -> Option<ChildrenMap> {
        let users = self.users.read().await;
        users
            .get(&Self::key(username, school_id))
            .map(|r| r.children.clone())
    }

    /// Whether the last sign-in identified a parent account
    pub async fn is_parent(&self, username: &str, school_id: i64) -> Option<bool> {
        let users = self.users.read().await;
        users.get(&Self::key(username, school_id)).map(|r| r.is_parent)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn user_auth_data(&self, username: &str, school_id: i64) -> StoreResult<AuthData> {
        let school = self.schools.get(school_id).cloned().ok_or_else(|| StoreError::NotFound {
            entity: "school",
            key: school_id.to_string(),
        })?;

        let users = self.users.read().await;
        let record = users
            .get(&Self::key(username, school_id))
            .ok_or_else(|| Self::user_not_found(username, school_id))?;

        Ok(AuthData {
            school,
            credentials: Credentials::new(username, record.password.clone()),
        })
    }

    async fn school_permission(&self, school_id: i64) -> StoreResult<bool> {
        let permissions = self.school_permissions.read().await;
        permissions.get(&school_id).copied().ok_or_else(|| StoreError::NotFound {
            entity: "school",
            key: school_id.to_string(),
        })
    }

    async fn user_permission(&self, username: &str, school_id: i64) -> StoreResult<bool> {
        let users = self.users.read().await;
        users
            .get(&Self::key(username, school_id))
            .map(|r| r.permission)
            .ok_or_else(|| Self::user_not_found(username, school_id))
    }

    async fn update_user(
        &self,
        username: &str,
        password: &str,
        is_parent: bool,
        school_id: i64,
        children: &ChildrenMap,
    ) -> StoreResult<()> {
        let mut users = self.users.write().await;
        users
            .entry(Self::key(username, school_id))
            .and_modify(|r| {
                r.password = password.to_string();
                r.is_parent = is_parent;
                r.children = children.clone();
            })
            .or_insert_with(|| UserRecord {
                password: password.to_string(),
                is_parent,
                permission: true,
                children: children.clone(),
                done: HashSet::new(),
            });
        Ok(())
    }

    async fn done_tasks(&self, username: &str, school_id: i64) -> StoreResult<HashSet<i64>> {
        let users = self.users.read().await;
        users
            .get(&Self::key(username, school_id))
            .map(|r| r.done.clone())
            .ok_or_else(|| Self::user_not_found(username, school_id))
    }

    async fn set_task_done(
        &self,
        username: &str,
        school_id: i64,
        assignment_id: i64,
        done: bool,
    ) -> StoreResult<()> {
        let mut users = self.users.write().await;
        let record = users
            .get_mut(&Self::key(username, school_id))
            .ok_or_else(|| Self::user_not_found(username, school_id))?;
        if done {
            record.done.insert(assignment_id);
        } else {
            record.done.remove(&assignment_id);
        }
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
