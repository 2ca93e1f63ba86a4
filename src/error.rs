//! Error types for the identity API and the key-value stores.
//!
//! ERROR HANDLING
//! ==============
//! `SessionProbe::get_session` never surfaces these: identity-check failures
//! are normalized into a signed-out snapshot and store failures are logged
//! and swallowed. They reach callers only from explicit user actions
//! (logout, profile update) where a notification is expected.

// =============================================================================
// PROBE ERROR
// =============================================================================

/// Errors produced by calls against the identity backend.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The HTTP request could not be sent or the body could not be read.
    #[error("identity request failed: {0}")]
    Request(String),

    /// The backend answered with a non-success HTTP status.
    #[error("identity endpoint returned status {status}")]
    Status { status: u16, body: String },

    /// The response body was not the expected JSON shape.
    #[error("identity response parse failed: {0}")]
    Parse(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The logout endpoint answered `success: false`.
    #[error("logout was not acknowledged by the server")]
    LogoutRejected,

    /// The profile endpoint refused the update.
    #[error("profile update rejected: {0}")]
    ProfileRejected(String),
}

impl ProbeError {
    /// Whether retrying the same call could plausibly succeed.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Status { status: 429 | 500..=599, .. })
    }
}

// =============================================================================
// STORE ERROR
// =============================================================================

/// Errors produced by [`crate::store::KeyValueStore`] implementations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store io failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store value encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}
