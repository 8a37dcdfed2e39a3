//! Local (client-facing) sessions
//!
//! A local session identifies one signed-in device. Its token is an HS256
//! JWT carried in a cookie; the `sid` claim is the key under which the
//! session registry keeps the matching remote portal session.

use crate::config::AuthConfig;
use crate::errors::{AppError, Result};
use axum::http::HeaderMap;
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Claims stored in the session cookie
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Local session id
    pub sid: String,

    /// Portal username
    pub sub: String,

    /// School id
    pub school_id: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// An authenticated end-user device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSession {
    pub session_id: String,
    pub username: String,
    pub school_id: i64,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LocalSession {
    fn from_claims(claims: SessionClaims) -> Self {
        Self {
            session_id: claims.sid,
            username: claims.sub,
            school_id: claims.school_id,
            issued_at: timestamp(claims.iat),
            expires_at: timestamp(claims.exp),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_default()
}

/// Issues, validates and revokes local session tokens
pub struct LocalSessionManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: i64,
    cookie_name: String,
    /// Revoked session ids with their expiry timestamp
    revoked: RwLock<HashMap<String, i64>>,
}

impl LocalSessionManager {
    /// Create a manager with the given signing secret
    pub fn new(secret: &[u8], ttl_secs: u64, cookie_name: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl_secs: ttl_secs as i64,
            cookie_name: cookie_name.into(),
            revoked: RwLock::new(HashMap::new()),
        }
    }

    /// Create a manager from configuration. Without a configured secret a
    /// random one is generated, so tokens do not survive a restart.
    pub fn from_config(config: &AuthConfig) -> Self {
        match config.session_secret.as_deref() {
            Some(secret) => Self::new(secret.as_bytes(), config.session_ttl_secs, &config.cookie_name),
            None => {
                let secret: [u8; 32] = rand::random();
                tracing::warn!("No session secret configured, generated a per-process key");
                Self::new(&secret, config.session_ttl_secs, &config.cookie_name)
            }
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Start a new local session and return it with its signed token
    pub fn issue(&self, username: &str, school_id: i64) -> Result<(LocalSession, String)> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.ttl_secs);

        let claims = SessionClaims {
            sid: Uuid::new_v4().to_string(),
            sub: username.to_string(),
            school_id,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal {
                message: format!("Failed to sign session token: {}", e)
            })?;

        Ok((LocalSession::from_claims(claims), token))
    }

    /// Validate a token: signature, expiry and revocation
    pub async fn validate(&self, token: &str) -> Result<LocalSession> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        let claims = decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| AppError::SessionExpired)?;

        if self.revoked.read().await.contains_key(&claims.sid) {
            return Err(AppError::SessionExpired);
        }

        Ok(LocalSession::from_claims(claims))
    }

    /// Session id of a correctly signed token, even if it has expired
    pub fn session_id_of(&self, token: &str) -> Option<String> {
        let mut validation = Validation::default();
        validation.validate_exp = false;

        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .ok()
            .map(|data| data.claims.sid)
    }

    /// Revoke a session until its natural expiry
    pub async fn revoke(&self, session: &LocalSession) {
        let now = Utc::now().timestamp();
        let mut revoked = self.revoked.write().await;
        revoked.retain(|_, exp| *exp > now);
        revoked.insert(session.session_id.clone(), session.expires_at.timestamp());
    }

    /// Read the session token from request headers
    pub fn token_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        CookieJar::from_headers(headers)
            .get(&self.cookie_name)
            .map(|cookie| cookie.value().to_string())
    }
}
