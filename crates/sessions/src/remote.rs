//! One authenticated connection to a school portal
//!
//! The adapter sits behind a per-session async mutex. Login, fetch and
//! logout each hold it for their whole duration, so concurrent requests of
//! the same user run one after another (FIFO) and never see half-updated
//! auth state. Different sessions never share a lock.

use crate::error::PortalError;
use crate::ops::PortalOperation;
use crate::portal::Portal;
use chrono::{DateTime, Utc};
use schoolbridge_common::{metrics, AuthData, School};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

pub struct RemoteSession {
    school: School,
    username: String,
    portal: Mutex<Box<dyn Portal>>,
    created_at: DateTime<Utc>,
    /// Unix milliseconds of the last completed call
    last_activity: AtomicI64,
}

impl RemoteSession {
    /// Wrap an adapter; the session is not logged in yet
    pub fn new(auth: &AuthData, portal: Box<dyn Portal>) -> Self {
        let now = Utc::now();
        Self {
            school: auth.school.clone(),
            username: auth.credentials.login.clone(),
            portal: Mutex::new(portal),
            created_at: now,
            last_activity: AtomicI64::new(now.timestamp_millis()),
        }
    }

    pub fn school(&self) -> &School {
        &self.school
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_activity.load(Ordering::Relaxed))
            .unwrap_or(self.created_at)
    }

    /// Time since the last completed call
    pub fn idle_for(&self) -> Duration {
        let idle_ms = Utc::now().timestamp_millis() - self.last_activity.load(Ordering::Relaxed);
        Duration::from_millis(idle_ms.max(0) as u64)
    }

    fn touch(&self) {
        self.last_activity.store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    /// Run the portal login handshake
    pub async fn login(&self) -> Result<(), PortalError> {
        let mut portal = self.portal.lock().await;
        let result = portal.login().await;
        metrics::record_login(portal.kind().as_str(), result.is_ok());
        drop(portal);
        self.touch();

        match &result {
            Ok(()) => tracing::info!(
                school_id = self.school.id,
                username = %self.username,
                "Remote login succeeded"
            ),
            Err(e) => tracing::warn!(
                school_id = self.school.id,
                username = %self.username,
                error = %e,
                "Remote login failed"
            ),
        }
        result
    }

    /// Run one operation with the current auth state
    pub async fn fetch<O>(&self, op: &O) -> Result<O::Output, PortalError>
    where
        O: PortalOperation,
    {
        let mut portal = self.portal.lock().await;
        let start = Instant::now();
        let result = op.run(&mut **portal).await;
        let elapsed = start.elapsed();
        drop(portal);
        self.touch();

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        metrics::record_portal_fetch(op.name(), outcome, elapsed.as_secs_f64());

        if let Err(e) = &result {
            tracing::debug!(
                school_id = self.school.id,
                operation = op.name(),
                error = %e,
                "Portal fetch failed"
            );
        }
        result
    }

    /// Best-effort remote logout
    pub async fn logout(&self) -> Result<(), PortalError> {
        let result = self.portal.lock().await.logout().await;
        if let Err(e) = &result {
            tracing::warn!(
                school_id = self.school.id,
                username = %self.username,
                error = %e,
                "Remote logout failed"
            );
        }
        result
    }
}

impl fmt::Debug for RemoteSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSession")
            .field("school_id", &self.school.id)
            .field("username", &self.username)
            .field("created_at", &self.created_at)
            .finish()
    }
}
