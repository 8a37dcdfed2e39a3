//! School list handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct SchoolListResponse {
    pub schools: Vec<SchoolEntry>,
}

#[derive(Serialize)]
pub struct SchoolEntry {
    pub id: i64,
    pub name: String,
    pub website: String,
}

/// Every configured school; no session required
pub async fn get_school_list(State(state): State<AppState>) -> Json<SchoolListResponse> {
    let schools = state
        .schools
        .list()
        .iter()
        .map(|school| SchoolEntry {
            id: school.id,
            name: school.name.clone(),
            website: school.base_url().to_string(),
        })
        .collect();

    Json(SchoolListResponse { schools })
}

#[cfg(test)]
mod tests {
    use crate::testing::{json, Harness, CLOSED_SCHOOL, DEMO_SCHOOL};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_lists_configured_schools() {
        let harness = Harness::new();

        let response = harness.get("/get_school_list", None).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        let ids: Vec<i64> = body["schools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![DEMO_SCHOOL, CLOSED_SCHOOL]);
        assert_eq!(body["schools"][0]["website"], "http://localhost");
    }
}
