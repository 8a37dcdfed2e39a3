//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
    pub remote_sessions: usize,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub store: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: schoolbridge_common::VERSION,
    })
}

/// Readiness probe - checks the store and reports live remote sessions
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let start = std::time::Instant::now();

    let store_check = match state.store.ping().await {
        Ok(_) => CheckResult {
            status: "up".to_string(),
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => CheckResult {
            status: "down".to_string(),
            latency_ms: None,
            error: Some(e.to_string()),
        },
    };

    let all_healthy = store_check.status == "up";

    Json(ReadyResponse {
        status: if all_healthy { "ready" } else { "not_ready" }.to_string(),
        checks: HealthChecks { store: store_check },
        remote_sessions: state.registry.len().await,
    })
}

#[cfg(test)]
mod tests {
    use crate::testing::{json, Harness};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_health() {
        let harness = Harness::new();
        let response = harness.get("/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_ready_counts_remote_sessions() {
        let harness = Harness::new();
        harness.sign_in("parent").await;

        let body = json(harness.get("/ready", None).await).await;
        assert_eq!(body["status"], "ready");
        assert_eq!(body["checks"]["store"]["status"], "up");
        assert_eq!(body["remote_sessions"], 1);
    }
}
