//! Session snapshot types handed to callers.
//!
//! DESIGN
//! ======
//! `AuthSnapshot` stores only `Option<SessionUser>`; "authenticated" is
//! derived from the presence of a user, so a snapshot claiming to be signed
//! in without a user cannot be constructed. The serialized form keeps the
//! backend's `{ authenticated, user }` shape for the per-tab mirror.

use serde::{Deserialize, Serialize};

use crate::fallback::PersistentAuthFallback;

// =============================================================================
// SESSION USER
// =============================================================================

/// Identity details of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    /// Backend user id, absent when the payload omitted it.
    pub id: Option<i64>,
    pub username: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub is_admin: bool,
    /// A Google account is linked to this user.
    pub google_linked: bool,
    /// A Telegram account is linked to this user.
    pub telegram_linked: bool,
    /// ISO-8601 creation timestamp as sent by the backend.
    pub created_at: Option<String>,
    pub last_login: Option<String>,
}

impl SessionUser {
    /// Minimal user carrying only a name. Used by tests and stubs.
    #[must_use]
    pub fn named(username: impl Into<String>) -> Self {
        Self {
            id: None,
            username: username.into(),
            email: None,
            avatar_url: None,
            is_admin: false,
            google_linked: false,
            telegram_linked: false,
            created_at: None,
            last_login: None,
        }
    }
}

// =============================================================================
// AUTH SNAPSHOT
// =============================================================================

/// Immutable point-in-time authentication result.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "SnapshotRecord", from = "SnapshotRecord")]
pub struct AuthSnapshot {
    user: Option<SessionUser>,
}

impl AuthSnapshot {
    /// A confirmed signed-out result.
    #[must_use]
    pub fn signed_out() -> Self {
        Self { user: None }
    }

    #[must_use]
    pub fn signed_in(user: SessionUser) -> Self {
        Self { user: Some(user) }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    #[must_use]
    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().map(|u| u.username.as_str())
    }
}

#[derive(Clone, Serialize, Deserialize)]
struct SnapshotRecord {
    authenticated: bool,
    #[serde(default)]
    user: Option<SessionUser>,
}

impl From<AuthSnapshot> for SnapshotRecord {
    fn from(snapshot: AuthSnapshot) -> Self {
        Self { authenticated: snapshot.user.is_some(), user: snapshot.user }
    }
}

impl From<SnapshotRecord> for AuthSnapshot {
    fn from(record: SnapshotRecord) -> Self {
        match record {
            SnapshotRecord { authenticated: true, user: Some(user) } => Self::signed_in(user),
            _ => Self::signed_out(),
        }
    }
}

// =============================================================================
// SESSION PHASE
// =============================================================================

/// What the UI currently knows about the session.
///
/// Moves from `Unresolved` to an optional `Optimistic` hint during startup,
/// then to `Authoritative` once any probe completes. `Optimistic` only carries
/// the low-fidelity fallback so it cannot be mistaken for a real snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Unresolved,
    Optimistic(PersistentAuthFallback),
    Authoritative(AuthSnapshot),
}

impl SessionPhase {
    /// Whether the UI should render the signed-in chrome.
    #[must_use]
    pub fn shows_signed_in(&self) -> bool {
        match self {
            Self::Unresolved => false,
            Self::Optimistic(hint) => hint.authenticated,
            Self::Authoritative(snapshot) => snapshot.is_authenticated(),
        }
    }

    /// Display name for the header, if any.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        match self {
            Self::Unresolved => None,
            Self::Optimistic(hint) => Some(hint.username.as_str()),
            Self::Authoritative(snapshot) => snapshot.username(),
        }
    }

    #[must_use]
    pub fn is_authoritative(&self) -> bool {
        matches!(self, Self::Authoritative(_))
    }
}

#[cfg(test)]
#[path = "snapshot_test.rs"]
mod tests;
