//! Session registry
//!
//! Process-wide map from a local session id to its `RemoteSession`. The map
//! lock only guards lookups and mutations; it is never held while a session
//! logs in or talks to its portal.

use crate::error::{CreationFailure, SessionError};
use crate::portal::PortalFactory;
use crate::remote::RemoteSession;
use schoolbridge_common::{metrics, AuthData, StoreError};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<RemoteSession>>>,
    factory: Arc<dyn PortalFactory>,
}

impl SessionRegistry {
    pub fn new(factory: Arc<dyn PortalFactory>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            factory,
        }
    }

    /// Pure lookup
    pub async fn get(&self, key: &str) -> Option<Arc<RemoteSession>> {
        self.sessions.read().await.get(key).cloned()
    }

    /// Build a session and log it in without registering it
    pub async fn connect(&self, auth: &AuthData) -> Result<Arc<RemoteSession>, SessionError> {
        let portal = self.factory.create(auth).map_err(CreationFailure::Login)?;
        let session = Arc::new(RemoteSession::new(auth, portal));
        session.login().await.map_err(CreationFailure::Login)?;
        Ok(session)
    }

    /// Register a logged-in session. An existing entry is replaced.
    pub async fn insert(&self, key: impl Into<String>, session: Arc<RemoteSession>) {
        let key = key.into();
        let mut sessions = self.sessions.write().await;
        if sessions.insert(key.clone(), session).is_some() {
            debug!(session_id = %key, "Replaced remote session");
        }
        metrics::record_remote_sessions(sessions.len());
    }

    /// Existing session for `key`, or a freshly logged-in one built from the
    /// credentials `resolve` returns. Nothing is inserted if login fails.
    ///
    /// Two concurrent calls for the same missing key both log in; the later
    /// insert wins.
    pub async fn get_or_create<F, Fut>(&self, key: &str, resolve: F) -> Result<Arc<RemoteSession>, SessionError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AuthData, StoreError>>,
    {
        if let Some(session) = self.get(key).await {
            return Ok(session);
        }

        debug!(session_id = %key, "No remote session, creating one");
        let auth = resolve().await.map_err(CreationFailure::Credentials)?;
        let session = self.connect(&auth).await?;
        self.insert(key, Arc::clone(&session)).await;
        Ok(session)
    }

    /// Remove the entry unconditionally. Does not log out.
    pub async fn invalidate(&self, key: &str) -> Option<Arc<RemoteSession>> {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(key);
        metrics::record_remote_sessions(sessions.len());
        removed
    }

    /// Remove the entry only if it still is `stale`, leaving a session that
    /// a concurrent request already replaced it with
    pub async fn invalidate_stale(&self, key: &str, stale: &Arc<RemoteSession>) -> bool {
        let mut sessions = self.sessions.write().await;
        let is_current = sessions
            .get(key)
            .is_some_and(|current| Arc::ptr_eq(current, stale));
        if is_current {
            sessions.remove(key);
            metrics::record_remote_sessions(sessions.len());
        }
        is_current
    }

    /// Log out remotely (best effort) and drop the entry
    pub async fn close(&self, key: &str) -> bool {
        let Some(session) = self.get(key).await else {
            return false;
        };

        // Failure is already logged by the session
        let _ = session.logout().await;
        self.invalidate_stale(key, &session).await
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Log out and drop every session idle longer than `max_idle`
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let evicted: Vec<(String, Arc<RemoteSession>)> = {
            let mut sessions = self.sessions.write().await;
            let idle: Vec<String> = sessions
                .iter()
                .filter(|(_, session)| session.idle_for() > max_idle)
                .map(|(key, _)| key.clone())
                .collect();
            let evicted = idle
                .into_iter()
                .filter_map(|key| sessions.remove(&key).map(|session| (key, session)))
                .collect();
            metrics::record_remote_sessions(sessions.len());
            evicted
        };

        for (key, session) in &evicted {
            if session.logout().await.is_err() {
                debug!(session_id = %key, "Evicted session did not log out cleanly");
            }
        }

        if !evicted.is_empty() {
            metrics::record_evictions(evicted.len());
        }
        evicted.len()
    }

    /// Log out and drop every session, e.g. on shutdown
    pub async fn close_all(&self) -> usize {
        let drained: Vec<(String, Arc<RemoteSession>)> = {
            let mut sessions = self.sessions.write().await;
            let drained = sessions.drain().collect();
            metrics::record_remote_sessions(0);
            drained
        };

        for (key, session) in &drained {
            if session.logout().await.is_err() {
                debug!(session_id = %key, "Session did not log out cleanly");
            }
        }
        drained.len()
    }

    /// Periodically evict idle sessions until the returned handle is aborted
    pub fn spawn_idle_sweeper(self: &Arc<Self>, max_idle: Duration, every: Duration) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let evicted = registry.evict_idle(max_idle).await;
                if evicted > 0 {
                    let remaining = registry.len().await;
                    info!(evicted, remaining, "Evicted idle remote sessions");
                }
            }
        })
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry").finish_non_exhaustive()
    }
}
