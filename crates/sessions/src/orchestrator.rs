//! Relogin-and-retry policy shared by every data endpoint
//!
//! A fetch that fails with `LoggedOut` drops the stale session, logs in
//! again and is retried exactly once. Whatever the retry returns is final.

use crate::error::{PortalError, SessionError};
use crate::ops::PortalOperation;
use crate::registry::SessionRegistry;
use schoolbridge_common::{metrics, AuthData, StoreError};
use std::future::Future;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Fresh,
    Retried,
}

#[derive(Debug, Clone)]
pub struct Orchestrator {
    registry: Arc<SessionRegistry>,
}

impl Orchestrator {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Run `op` on the remote session registered under `key`, creating it
    /// from `resolve`d credentials when absent
    pub async fn fetch<O, F, Fut>(&self, key: &str, resolve: F, op: &O) -> Result<O::Output, SessionError>
    where
        O: PortalOperation,
        F: Fn() -> Fut,
        Fut: Future<Output = Result<AuthData, StoreError>>,
    {
        let mut attempt = Attempt::Fresh;

        loop {
            let session = self.registry.get_or_create(key, &resolve).await?;

            match session.fetch(op).await {
                Ok(output) => return Ok(output),
                Err(PortalError::LoggedOut) if attempt == Attempt::Fresh => {
                    tracing::info!(
                        session_id = %key,
                        operation = op.name(),
                        "Remote session went stale, logging in again"
                    );
                    metrics::record_relogin(op.name());
                    self.registry.invalidate_stale(key, &session).await;
                    attempt = Attempt::Retried;
                }
                Err(e) => {
                    if attempt == Attempt::Retried {
                        tracing::warn!(
                            session_id = %key,
                            operation = op.name(),
                            error = %e,
                            "Fetch failed after relogin"
                        );
                    }
                    return Err(e.into());
                }
            }
        }
    }
}
