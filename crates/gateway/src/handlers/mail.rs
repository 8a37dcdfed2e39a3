//! Mail and announcement handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use validator::Validate;

use crate::extract::{ApiJson, SignedIn};
use crate::handlers::validate;
use crate::AppState;
use schoolbridge_common::errors::Result;
use schoolbridge_sessions::model::{EmailsList, Posts};
use schoolbridge_sessions::ops::{DeleteMail, FetchMail, FetchPosts};

#[derive(Debug, Deserialize, Validate)]
pub struct DeleteMailRequest {
    #[validate(length(min = 1))]
    pub box_id: String,

    #[validate(length(min = 1, max = 100))]
    pub message_ids: Vec<String>,
}

/// Inbox letters
pub async fn get_mail(State(state): State<AppState>, SignedIn(session): SignedIn) -> Result<Json<EmailsList>> {
    Ok(Json(state.fetch(&session, FetchMail).await?))
}

pub async fn delete_mail(
    State(state): State<AppState>,
    SignedIn(session): SignedIn,
    ApiJson(request): ApiJson<DeleteMailRequest>,
) -> Result<StatusCode> {
    validate(&request)?;

    let op = DeleteMail {
        box_id: request.box_id,
        message_ids: request.message_ids,
    };
    state.fetch(&session, op).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// School announcements
pub async fn get_posts(State(state): State<AppState>, SignedIn(session): SignedIn) -> Result<Json<Posts>> {
    Ok(Json(state.fetch(&session, FetchPosts).await?))
}
