//! Diary handlers: children, schedule, marks and homework

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use validator::Validate;

use crate::extract::{ApiJson, SignedIn};
use crate::handlers::{parse_date, validate};
use crate::AppState;
use schoolbridge_common::{errors::Result, ChildrenMap};
use schoolbridge_sessions::model::{LessonDescription, TimeTable, WeekSchoolMarks};
use schoolbridge_sessions::ops::{FetchChildren, FetchLessonDescription, FetchTimeTable, FetchWeekMarks};

#[derive(Debug, Deserialize, Validate)]
pub struct ScheduleRequest {
    /// Student id
    pub id: i64,

    #[serde(default = "default_days")]
    #[validate(range(min = 1, max = 7))]
    pub days: u32,

    /// First day; today when absent
    #[serde(default)]
    pub date: Option<String>,
}

fn default_days() -> u32 { 7 }

#[derive(Debug, Deserialize)]
pub struct TasksAndMarksRequest {
    /// Student id
    pub id: i64,

    /// Any day of the wanted week; the current week when absent
    #[serde(default)]
    pub week: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LessonDescriptionRequest {
    /// Student id
    pub id: i64,
    pub assignment_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TaskStatusRequest {
    pub assignment_id: i64,
}

pub async fn get_children_map(
    State(state): State<AppState>,
    SignedIn(session): SignedIn,
) -> Result<Json<ChildrenMap>> {
    let children = state.fetch(&session, FetchChildren).await?;
    Ok(Json(children))
}

pub async fn get_schedule(
    State(state): State<AppState>,
    SignedIn(session): SignedIn,
    ApiJson(request): ApiJson<ScheduleRequest>,
) -> Result<Json<TimeTable>> {
    validate(&request)?;
    let from = parse_date("date", request.date.as_deref())?;

    let op = FetchTimeTable {
        student_id: request.id.to_string(),
        from,
        days: request.days,
    };
    Ok(Json(state.fetch(&session, op).await?))
}

/// Week marks with the user's own done flags merged in
pub async fn get_tasks_and_marks(
    State(state): State<AppState>,
    SignedIn(session): SignedIn,
    ApiJson(request): ApiJson<TasksAndMarksRequest>,
) -> Result<Json<WeekSchoolMarks>> {
    let week = parse_date("week", request.week.as_deref())?;

    let op = FetchWeekMarks {
        student_id: request.id.to_string(),
        week,
    };
    let mut marks = state.fetch(&session, op).await?;

    let done = state.store.done_tasks(&session.username, session.school_id).await?;
    marks.apply_done(|assignment_id| done.contains(&assignment_id));

    Ok(Json(marks))
}

pub async fn get_lesson_description(
    State(state): State<AppState>,
    SignedIn(session): SignedIn,
    ApiJson(request): ApiJson<LessonDescriptionRequest>,
) -> Result<Json<LessonDescription>> {
    let op = FetchLessonDescription {
        student_id: request.id.to_string(),
        assignment_id: request.assignment_id,
    };
    Ok(Json(state.fetch(&session, op).await?))
}

pub async fn mark_as_done(
    State(state): State<AppState>,
    SignedIn(session): SignedIn,
    ApiJson(request): ApiJson<TaskStatusRequest>,
) -> Result<StatusCode> {
    set_task_status(&state, &session, request.assignment_id, true).await
}

pub async fn unmark_as_done(
    State(state): State<AppState>,
    SignedIn(session): SignedIn,
    ApiJson(request): ApiJson<TaskStatusRequest>,
) -> Result<StatusCode> {
    set_task_status(&state, &session, request.assignment_id, false).await
}

async fn set_task_status(
    state: &AppState,
    session: &schoolbridge_common::LocalSession,
    assignment_id: i64,
    done: bool,
) -> Result<StatusCode> {
    state
        .store
        .set_task_done(&session.username, session.school_id, assignment_id, done)
        .await?;

    tracing::debug!(
        session_id = %session.session_id,
        assignment_id,
        done,
        "Task status updated"
    );

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::testing::{json, session_cookie, Harness};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use schoolbridge_sessions::{ops::FetchChildren, PortalError};
    use serde_json::{json, Value};

    #[tokio::test]
    async fn test_children_map_requires_session() {
        let harness = Harness::new();
        let response = harness.get("/get_children_map", None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json(response).await["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_children_map() {
        let harness = Harness::new();
        let token = harness.sign_in("parent").await;

        let response = harness.get("/get_children_map", Some(&token)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["Demo Student"]["clid"], "501");
    }

    #[tokio::test]
    async fn test_schedule_days() {
        let harness = Harness::new();
        let token = harness.sign_in("parent").await;

        let response = harness
            .post("/get_schedule", Some(&token), json!({ "id": 1001, "days": 3, "date": "09.09.2024" }))
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = json(response).await;
        let days = body["days"].as_array().unwrap();
        assert_eq!(days.len(), 3);
        assert_eq!(days[0]["date"], "2024-09-09");
        assert_eq!(days[0]["lessons"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_schedule_rejects_out_of_range_days() {
        let harness = Harness::new();
        let token = harness.sign_in("parent").await;

        for days in [0, 8] {
            let response = harness
                .post("/get_schedule", Some(&token), json!({ "id": 1001, "days": days }))
                .await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_done_flags_are_merged_into_marks() {
        let harness = Harness::new();
        let token = harness.sign_in("parent").await;
        let request = json!({ "id": 1001, "week": "04.09.2024" });

        let body = json(harness.post("/get_tasks_and_marks", Some(&token), request.clone()).await).await;
        let first = &body["days"][0]["lessons"][0];
        assert_eq!(first["done"], false);
        let assignment_id = first["assignment_id"].as_i64().unwrap();

        let response = harness
            .post("/mark_as_done", Some(&token), json!({ "assignment_id": assignment_id }))
            .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let body = json(harness.post("/get_tasks_and_marks", Some(&token), request.clone()).await).await;
        let done: Vec<i64> = all_marks(&body)
            .filter(|m| m["done"] == true)
            .map(|m| m["assignment_id"].as_i64().unwrap())
            .collect();
        assert_eq!(done, vec![assignment_id]);

        harness
            .post("/unmark_as_done", Some(&token), json!({ "assignment_id": assignment_id }))
            .await;
        let body = json(harness.post("/get_tasks_and_marks", Some(&token), request).await).await;
        assert!(all_marks(&body).all(|m| m["done"] == false));
    }

    fn all_marks(body: &Value) -> impl Iterator<Item = &Value> {
        body["days"]
            .as_array()
            .into_iter()
            .flatten()
            .flat_map(|day| day["lessons"].as_array().into_iter().flatten())
    }

    #[tokio::test]
    async fn test_invalid_week_is_bad_request() {
        let harness = Harness::new();
        let token = harness.sign_in("parent").await;

        let response = harness
            .post("/get_tasks_and_marks", Some(&token), json!({ "id": 1001, "week": "someday" }))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_lesson_description() {
        let harness = Harness::new();
        let token = harness.sign_in("parent").await;

        let response = harness
            .post("/get_lesson_description", Some(&token), json!({ "id": 1001, "assignment_id": 7 }))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["assignment_id"], 7);
    }

    #[tokio::test]
    async fn test_portal_logout_is_recovered_transparently() {
        let harness = Harness::new();
        let token = harness.sign_in("parent").await;
        let session = harness.state.local_sessions.validate(&token).await.unwrap();

        // The portal drops the session behind our back
        let remote = harness.state.registry.get(&session.session_id).await.unwrap();
        remote.logout().await.unwrap();

        let response = harness.get("/get_children_map", Some(&token)).await;
        assert_eq!(response.status(), StatusCode::OK);

        let current = harness.state.registry.get(&session.session_id).await.unwrap();
        assert!(!std::sync::Arc::ptr_eq(&current, &remote));
    }

    #[tokio::test]
    async fn test_evicted_remote_session_is_recreated_from_store() {
        let harness = Harness::new();
        let token = harness.sign_in("parent").await;
        let session = harness.state.local_sessions.validate(&token).await.unwrap();

        harness.state.registry.invalidate(&session.session_id).await;

        let response = harness.get("/get_children_map", Some(&token)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(harness.state.registry.get(&session.session_id).await.is_some());
    }

    #[tokio::test]
    async fn test_broken_cookie_is_cleared() {
        let harness = Harness::new();
        let token = harness.sign_in("parent").await;
        let session = harness.state.local_sessions.validate(&token).await.unwrap();

        // Same session, signature no longer matches
        let tampered = format!("{}x", token);
        let response = harness.get("/get_children_map", Some(&tampered)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(session_cookie(&response).as_deref(), Some(""));

        // Unverifiable tokens cannot evict anything
        assert!(harness.state.registry.get(&session.session_id).await.is_some());

        // A revoked token closes the remote session it was bound to
        let remote = harness.state.registry.get(&session.session_id).await.unwrap();
        harness.state.local_sessions.revoke(&session).await;
        let response = harness.get("/get_children_map", Some(&token)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(harness.state.registry.get(&session.session_id).await.is_none());
        assert_eq!(remote.fetch(&FetchChildren).await.unwrap_err(), PortalError::LoggedOut);
    }

    #[tokio::test]
    async fn test_mistyped_schedule_request_is_bad_request() {
        let harness = Harness::new();
        let token = harness.sign_in("parent").await;

        let response = harness.post("/get_schedule", Some(&token), json!({ "id": "abc" })).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json(response).await;
        assert_eq!(body["error"]["code"], "INVALID_FORMAT");
        assert!(body["error"]["message"].is_string());
    }

    #[tokio::test]
    async fn test_body_that_is_not_json_is_bad_request() {
        let harness = Harness::new();
        let token = harness.sign_in("parent").await;

        let request = Request::post("/get_schedule")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::COOKIE, format!("sessionName={}", token))
            .body(Body::from("{not json"))
            .unwrap();
        let response = harness.send(request).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await["error"]["code"], "INVALID_FORMAT");
    }
}
