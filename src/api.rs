//! Identity backend client.
//!
//! DESIGN
//! ======
//! `IdentityApi` is the seam between `SessionProbe` and the network so the
//! probe logic can be driven by mocks. `HttpIdentityApi` is the reqwest
//! implementation against the recipe backend:
//!
//! - `GET  /api/auth/user`   → `{ authenticated, user }`
//! - `POST /api/auth/logout` → `{ success }`
//! - `PUT  /api/profile`     → `{ success, user }` or `{ error }`
//!
//! Response parsing is kept in pure functions for testability.

use reqwest::header::{ACCEPT, CACHE_CONTROL, COOKIE, HeaderMap, HeaderValue, PRAGMA};
use serde::{Deserialize, Serialize};

use crate::config::ProbeConfig;
use crate::error::ProbeError;
use crate::snapshot::{AuthSnapshot, SessionUser};

const IDENTITY_PATH: &str = "/api/auth/user";
const LOGOUT_PATH: &str = "/api/auth/logout";
const PROFILE_PATH: &str = "/api/profile";

/// Session state must never be served by an intermediate cache.
pub const NO_STORE: &str = "no-cache, no-store, must-revalidate";

// =============================================================================
// TRAIT
// =============================================================================

/// Remote calls the session coordinator depends on.
#[async_trait::async_trait]
pub trait IdentityApi: Send + Sync {
    /// Ask the backend who the current session belongs to.
    async fn check_identity(&self) -> Result<AuthSnapshot, ProbeError>;

    /// End the current session.
    async fn logout(&self) -> Result<(), ProbeError>;

    /// Change the username and/or avatar of the signed-in user.
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<SessionUser, ProbeError>;
}

/// Body of `PUT /api/profile`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

pub struct HttpIdentityApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpIdentityApi {
    /// Build a client from probe config.
    ///
    /// `session_cookie` is sent verbatim as the `Cookie` header, e.g.
    /// `session=abc123`. Cookies set by the backend are kept either way.
    ///
    /// # Errors
    ///
    /// Returns an error if the cookie is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &ProbeConfig, session_cookie: Option<&str>) -> Result<Self, ProbeError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(cookie) = session_cookie {
            let value = HeaderValue::from_str(cookie).map_err(|e| ProbeError::HttpClientBuild(e.to_string()))?;
            headers.insert(COOKIE, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .timeout(config.timeouts.request)
            .connect_timeout(config.timeouts.connect)
            .build()
            .map_err(|e| ProbeError::HttpClientBuild(e.to_string()))?;

        Ok(Self { http, base_url: config.base_url.trim_end_matches('/').to_owned() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn read(response: reqwest::Response) -> Result<(u16, String), ProbeError> {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ProbeError::Request(e.to_string()))?;
        Ok((status, text))
    }
}

#[async_trait::async_trait]
impl IdentityApi for HttpIdentityApi {
    async fn check_identity(&self) -> Result<AuthSnapshot, ProbeError> {
        let response = self
            .http
            .get(self.url(IDENTITY_PATH))
            .header(CACHE_CONTROL, NO_STORE)
            .header(PRAGMA, "no-cache")
            .send()
            .await
            .map_err(|e| ProbeError::Request(e.to_string()))?;
        let (status, text) = Self::read(response).await?;
        parse_identity_response(status, &text)
    }

    async fn logout(&self) -> Result<(), ProbeError> {
        let response = self
            .http
            .post(self.url(LOGOUT_PATH))
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| ProbeError::Request(e.to_string()))?;
        let (status, text) = Self::read(response).await?;
        parse_logout_response(status, &text)
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<SessionUser, ProbeError> {
        let response = self
            .http
            .put(self.url(PROFILE_PATH))
            .header(CACHE_CONTROL, "no-cache")
            .json(update)
            .send()
            .await
            .map_err(|e| ProbeError::Request(e.to_string()))?;
        let (status, text) = Self::read(response).await?;
        parse_profile_response(status, &text)
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Deserialize)]
struct WireSnapshot {
    #[serde(default)]
    authenticated: bool,
    #[serde(default)]
    user: Option<WireUser>,
}

#[derive(Deserialize)]
struct WireUser {
    id: Option<i64>,
    username: String,
    email: Option<String>,
    avatar: Option<String>,
    is_admin: Option<bool>,
    created_at: Option<String>,
    last_login: Option<String>,
    google_id: Option<serde_json::Value>,
    telegram_id: Option<serde_json::Value>,
}

impl From<WireUser> for SessionUser {
    fn from(wire: WireUser) -> Self {
        Self {
            id: wire.id,
            username: wire.username,
            email: wire.email,
            avatar_url: wire.avatar.filter(|a| !a.is_empty()),
            is_admin: wire.is_admin.unwrap_or(false),
            google_linked: wire.google_id.is_some_and(|v| !v.is_null()),
            telegram_linked: wire.telegram_id.is_some_and(|v| !v.is_null()),
            created_at: wire.created_at,
            last_login: wire.last_login,
        }
    }
}

#[derive(Deserialize)]
struct WireAck {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    user: Option<WireUser>,
    #[serde(default)]
    error: Option<String>,
}

// =============================================================================
// PARSING
// =============================================================================

fn ensure_success(status: u16, text: &str) -> Result<(), ProbeError> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(ProbeError::Status { status, body: text.to_owned() })
    }
}

/// Parse an identity-check response.
///
/// A payload that claims `authenticated: true` without a user is read as
/// signed out.
pub(crate) fn parse_identity_response(status: u16, text: &str) -> Result<AuthSnapshot, ProbeError> {
    ensure_success(status, text)?;
    let wire: WireSnapshot = serde_json::from_str(text).map_err(|e| ProbeError::Parse(e.to_string()))?;
    Ok(match wire {
        WireSnapshot { authenticated: true, user: Some(user) } => AuthSnapshot::signed_in(user.into()),
        _ => AuthSnapshot::signed_out(),
    })
}

pub(crate) fn parse_logout_response(status: u16, text: &str) -> Result<(), ProbeError> {
    ensure_success(status, text)?;
    let ack: WireAck = serde_json::from_str(text).map_err(|e| ProbeError::Parse(e.to_string()))?;
    if ack.success { Ok(()) } else { Err(ProbeError::LogoutRejected) }
}

pub(crate) fn parse_profile_response(status: u16, text: &str) -> Result<SessionUser, ProbeError> {
    let ack: Option<WireAck> = serde_json::from_str(text).ok();
    if status == 400 {
        let reason = ack.and_then(|a| a.error).unwrap_or_else(|| "bad request".to_owned());
        return Err(ProbeError::ProfileRejected(reason));
    }
    ensure_success(status, text)?;
    let ack = ack.ok_or_else(|| ProbeError::Parse("profile response is not JSON".to_owned()))?;
    match ack {
        WireAck { success: true, user: Some(user), .. } => Ok(user.into()),
        WireAck { error: Some(reason), .. } => Err(ProbeError::ProfileRejected(reason)),
        _ => Err(ProbeError::Parse("profile response missing user".to_owned())),
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
