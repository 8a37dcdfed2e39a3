//! School descriptors, portal credentials and the children map
//!
//! Schools are static: they are loaded from configuration at startup and
//! never change while the process runs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Portal dialect spoken by a school's website
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortalKind {
    /// NetSchool web API ("type 01")
    #[serde(alias = "01")]
    NetSchool,
    /// Canned in-process portal for development and tests
    Demo,
}

impl PortalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortalKind::NetSchool => "netschool",
            PortalKind::Demo => "demo",
        }
    }
}

impl fmt::Display for PortalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static school descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct School {
    /// Numeric school id, as used by clients
    pub id: i64,

    /// Display name
    pub name: String,

    /// Website base URL, without trailing slash
    pub url: String,

    /// Portal dialect
    #[serde(rename = "type")]
    pub kind: PortalKind,

    /// Portal-specific auth scheme parameters (e.g. NetSchool `cid`, `scid`)
    #[serde(default)]
    pub auth: BTreeMap<String, String>,

    /// Whether every user of this school may use the service
    #[serde(default = "default_permission")]
    pub permission: bool,
}

fn default_permission() -> bool { true }

impl School {
    /// Base URL with any trailing slash removed
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Look up an auth scheme parameter
    pub fn auth_param(&self, key: &str) -> Option<&str> {
        self.auth.get(key).map(String::as_str)
    }
}

/// Read-only directory of configured schools
#[derive(Debug, Clone, Default)]
pub struct SchoolDirectory {
    schools: Arc<[School]>,
}

impl SchoolDirectory {
    pub fn new(schools: Vec<School>) -> Self {
        Self { schools: schools.into() }
    }

    pub fn get(&self, id: i64) -> Option<&School> {
        self.schools.iter().find(|s| s.id == id)
    }

    pub fn list(&self) -> &[School] {
        &self.schools
    }

    pub fn len(&self) -> usize {
        self.schools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schools.is_empty()
    }
}

/// Portal login and password of one user
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

impl Credentials {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything needed to open a remote session
#[derive(Debug, Clone)]
pub struct AuthData {
    pub school: School,
    pub credentials: Credentials,
}

/// One child (student) visible to the signed-in account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    /// Portal student id
    pub sid: String,
    /// Portal class id
    pub clid: String,
}

/// Child display name to student ids
pub type ChildrenMap = BTreeMap<String, Student>;
