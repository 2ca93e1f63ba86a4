//! Stored session records: the long-lived fallback and the per-tab mirror.
//!
//! Every helper here swallows store errors after logging them. A broken or
//! full store degrades startup to "unresolved" and never affects probing.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::snapshot::AuthSnapshot;
use crate::store::{KeyValueStore, get_json, set_json};

/// Persistent-store key of [`PersistentAuthFallback`].
pub const FALLBACK_KEY: &str = "auth_fallback";
/// Ephemeral-store key of [`ProbeMirror`].
pub const MIRROR_KEY: &str = "auth_check";

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

fn is_within(captured_at_ms: u64, now_ms: u64, window: Duration) -> bool {
    let window_ms = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
    now_ms.saturating_sub(captured_at_ms) < window_ms
}

// =============================================================================
// PERSISTENT FALLBACK
// =============================================================================

/// Low-fidelity hint that the user was signed in recently.
///
/// Carries a username only. It is used to render the header optimistically
/// before the first probe returns and is never a basis for authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentAuthFallback {
    pub authenticated: bool,
    pub username: String,
    pub captured_at_ms: u64,
}

impl PersistentAuthFallback {
    #[must_use]
    pub fn new(username: impl Into<String>, captured_at_ms: u64) -> Self {
        Self { authenticated: true, username: username.into(), captured_at_ms }
    }
}

/// Record a signed-in snapshot as the fallback. Signed-out snapshots remove it.
pub fn remember_snapshot(store: &dyn KeyValueStore, snapshot: &AuthSnapshot, now_ms: u64) {
    let Some(username) = snapshot.username() else {
        clear_fallback(store);
        return;
    };
    let record = PersistentAuthFallback::new(username, now_ms);
    if let Err(e) = set_json(store, FALLBACK_KEY, &record) {
        warn!(error = %e, "failed to persist auth fallback");
    }
}

/// Read the fallback if it is present, signed in, and younger than `ttl`.
///
/// Expired or unreadable records are deleted.
pub fn restore_fallback_at(store: &dyn KeyValueStore, now_ms: u64, ttl: Duration) -> Option<PersistentAuthFallback> {
    let record: PersistentAuthFallback = match get_json(store, FALLBACK_KEY) {
        Ok(Some(record)) => record,
        Ok(None) => return None,
        Err(e) => {
            warn!(error = %e, "discarding unreadable auth fallback");
            clear_fallback(store);
            return None;
        }
    };

    if record.authenticated && is_within(record.captured_at_ms, now_ms, ttl) {
        Some(record)
    } else {
        clear_fallback(store);
        None
    }
}

pub fn restore_fallback(store: &dyn KeyValueStore, ttl: Duration) -> Option<PersistentAuthFallback> {
    restore_fallback_at(store, epoch_ms(), ttl)
}

pub fn clear_fallback(store: &dyn KeyValueStore) {
    if let Err(e) = store.remove(FALLBACK_KEY) {
        warn!(error = %e, "failed to clear auth fallback");
    }
}

// =============================================================================
// PER-TAB MIRROR
// =============================================================================

/// Copy of the short-lived probe cache kept in the ephemeral store so a
/// restarted view can reuse a result that is still inside the window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeMirror {
    pub captured_at_ms: u64,
    pub snapshot: AuthSnapshot,
}

/// Mirror a signed-in snapshot; signed-out snapshots remove the mirror.
pub fn mirror_snapshot(store: &dyn KeyValueStore, snapshot: &AuthSnapshot, now_ms: u64) {
    if !snapshot.is_authenticated() {
        clear_mirror(store);
        return;
    }
    let mirror = ProbeMirror { captured_at_ms: now_ms, snapshot: snapshot.clone() };
    if let Err(e) = set_json(store, MIRROR_KEY, &mirror) {
        warn!(error = %e, "failed to mirror probe result");
    }
}

/// Read the mirror if it was captured less than `window` ago.
pub fn read_mirror_at(store: &dyn KeyValueStore, now_ms: u64, window: Duration) -> Option<ProbeMirror> {
    match get_json::<ProbeMirror>(store, MIRROR_KEY) {
        Ok(Some(mirror)) if is_within(mirror.captured_at_ms, now_ms, window) => Some(mirror),
        Ok(_) => None,
        Err(e) => {
            warn!(error = %e, "ignoring unreadable probe mirror");
            None
        }
    }
}

pub fn clear_mirror(store: &dyn KeyValueStore) {
    if let Err(e) = store.remove(MIRROR_KEY) {
        warn!(error = %e, "failed to clear probe mirror");
    }
}

#[cfg(test)]
#[path = "fallback_test.rs"]
mod tests;
