//! Request extractors
//!
//! `SignedIn` reads the session cookie and validates it. A cookie that is
//! present but no longer valid is cleared in the rejection, and whatever
//! remote session was registered under it is closed.

use axum::{
    extract::{FromRequest, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use schoolbridge_common::{AppError, LocalSession};
use tracing::debug;

use crate::AppState;

/// JSON body whose rejections render as `AppError`
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// The validated local session of the calling device
#[derive(Debug, Clone)]
pub struct SignedIn(pub LocalSession);

impl FromRequestParts<AppState> for SignedIn {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let manager = &state.local_sessions;

        let Some(token) = manager.token_from_headers(&parts.headers) else {
            return Err(AppError::Unauthorized {
                message: "Missing session cookie".to_string(),
            }
            .into_response());
        };

        match manager.validate(&token).await {
            Ok(session) => Ok(SignedIn(session)),
            Err(err) => {
                if let Some(session_id) = manager.session_id_of(&token) {
                    if state.registry.close(&session_id).await {
                        debug!(session_id = %session_id, "Closed remote session of a broken local session");
                    }
                }

                let jar = CookieJar::from_headers(&parts.headers).remove(removal_cookie(manager.cookie_name()));
                Err((jar, err).into_response())
            }
        }
    }
}

/// Cookie matching the one set at sign-in, for removal
pub fn removal_cookie(name: &str) -> Cookie<'static> {
    Cookie::build((name.to_string(), "")).path("/").build()
}
