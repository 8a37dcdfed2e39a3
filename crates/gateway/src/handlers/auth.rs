//! Sign-in, log-out and permission handlers

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::extract::{removal_cookie, ApiJson, SignedIn};
use crate::handlers::validate;
use crate::AppState;
use schoolbridge_common::{
    db::check_access,
    errors::{AppError, Result},
    AuthData, ChildrenMap, Credentials, LocalSession,
};
use schoolbridge_sessions::{ops::FetchChildren, RemoteSession, SessionError};

#[derive(Debug, Deserialize, Validate)]
pub struct CheckPermissionRequest {
    #[validate(length(min = 1, max = 256))]
    pub login: String,

    /// School id
    pub id: i64,
}

#[derive(Serialize)]
pub struct CheckPermissionResponse {
    pub permission: bool,
}

/// Sign-in request. No `Debug`: it carries the portal password.
#[derive(Deserialize, Validate)]
pub struct SignInRequest {
    #[validate(length(min = 1, max = 256))]
    pub login: String,

    #[validate(length(min = 1, max = 256))]
    pub passkey: String,

    /// School id
    pub id: i64,
}

/// Whether a user may use the service at a school
pub async fn check_permission(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CheckPermissionRequest>,
) -> Result<Json<CheckPermissionResponse>> {
    validate(&request)?;

    let permission = check_access(state.store.as_ref(), &request.login, request.id).await?;

    Ok(Json(CheckPermissionResponse { permission }))
}

/// Log in to the school portal and open a local session bound to it
pub async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(request): ApiJson<SignInRequest>,
) -> Result<(CookieJar, Json<ChildrenMap>)> {
    validate(&request)?;

    let school = state
        .schools
        .get(request.id)
        .cloned()
        .ok_or(AppError::UnknownSchool { id: request.id })?;

    if !check_access(state.store.as_ref(), &request.login, school.id).await? {
        tracing::info!(username = %request.login, school_id = school.id, "Access to service denied");
        return Err(AppError::AccessDenied);
    }

    let auth = AuthData {
        school,
        credentials: Credentials::new(request.login, request.passkey),
    };

    let remote = state.registry.connect(&auth).await?;
    let (local, token, children) = match open_local_session(&state, &auth, &remote).await {
        Ok(opened) => opened,
        Err(e) => {
            // Failure is already logged by the session
            let _ = remote.logout().await;
            return Err(e);
        }
    };
    state.registry.insert(local.session_id.clone(), remote).await;

    let cookie_name = state.local_sessions.cookie_name().to_string();
    if let Some(previous) = jar.get(&cookie_name) {
        close_previous(&state, previous.value()).await;
    }

    tracing::info!(
        session_id = %local.session_id,
        username = %local.username,
        school_id = local.school_id,
        children = children.len(),
        "Signed in"
    );

    let cookie = Cookie::build((cookie_name, token))
        .path("/")
        .http_only(true)
        .permanent();

    Ok((jar.add(cookie), Json(children)))
}

/// Everything after the portal login that can fail: children, store, token
async fn open_local_session(
    state: &AppState,
    auth: &AuthData,
    remote: &RemoteSession,
) -> Result<(LocalSession, String, ChildrenMap)> {
    let children = remote.fetch(&FetchChildren).await.map_err(SessionError::from)?;

    let username = &auth.credentials.login;
    let school_id = auth.school.id;
    state
        .store
        .update_user(username, &auth.credentials.password, !children.is_empty(), school_id, &children)
        .await?;

    let (local, token) = state.local_sessions.issue(username, school_id)?;
    Ok((local, token, children))
}

/// A device signing in again drops the session it held before
async fn close_previous(state: &AppState, token: &str) {
    let Ok(previous) = state.local_sessions.validate(token).await else {
        return;
    };
    state.registry.close(&previous.session_id).await;
    state.local_sessions.revoke(&previous).await;
    tracing::debug!(session_id = %previous.session_id, "Replaced previous local session");
}

/// Close the remote session, revoke the local one and clear the cookie
pub async fn log_out(
    State(state): State<AppState>,
    jar: CookieJar,
    SignedIn(session): SignedIn,
) -> (CookieJar, StatusCode) {
    let closed = state.registry.close(&session.session_id).await;
    state.local_sessions.revoke(&session).await;

    tracing::info!(
        session_id = %session.session_id,
        username = %session.username,
        remote_closed = closed,
        "Logged out"
    );

    (jar.remove(removal_cookie(state.local_sessions.cookie_name())), StatusCode::OK)
}
