//! Identity-scoped caches that must be dropped when the user changes.
//!
//! Recipe lists, favorites, and per-recipe like state are fetched on behalf
//! of a specific user. Anything that could leak or imply that identity
//! registers with the `SessionProbe` and is invalidated on logout.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::warn;

use crate::store::{KeyValueStore, get_json, set_json};

/// Persistent-store key of the per-recipe like cache.
pub const LIKES_KEY: &str = "recipe_likes";

/// Cache whose contents depend on who is signed in.
pub trait DependentCache: Send + Sync {
    /// Short label used in logs.
    fn label(&self) -> &'static str;
    fn invalidate(&self);
}

// =============================================================================
// TIMED CACHE
// =============================================================================

/// Single memoized value with an optional time-to-live.
pub struct TimedCache<T> {
    label: &'static str,
    ttl: Option<Duration>,
    slot: Mutex<Option<(T, Instant)>>,
}

impl<T: Clone + Send> TimedCache<T> {
    /// Cache that expires `ttl` after each `put`.
    #[must_use]
    pub fn with_ttl(label: &'static str, ttl: Duration) -> Self {
        Self { label, ttl: Some(ttl), slot: Mutex::new(None) }
    }

    /// Cache that holds its value until invalidated.
    #[must_use]
    pub fn until_invalidated(label: &'static str) -> Self {
        Self { label, ttl: None, slot: Mutex::new(None) }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<(T, Instant)>> {
        self.slot
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    #[must_use]
    pub fn get(&self) -> Option<T> {
        let slot = self.slot();
        let (value, stored_at) = slot.as_ref()?;
        match self.ttl {
            Some(ttl) if stored_at.elapsed() >= ttl => None,
            _ => Some(value.clone()),
        }
    }

    pub fn put(&self, value: T) {
        *self.slot() = Some((value, Instant::now()));
    }
}

impl<T: Clone + Send> DependentCache for TimedCache<T> {
    fn label(&self) -> &'static str {
        self.label
    }

    fn invalidate(&self) {
        *self.slot() = None;
    }
}

// =============================================================================
// LIKES CACHE
// =============================================================================

/// Like state of one recipe as last seen by this user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeState {
    pub liked: bool,
    pub likes_count: u64,
}

/// Per-recipe like state persisted across restarts.
pub struct LikesCache {
    store: Arc<dyn KeyValueStore>,
}

impl LikesCache {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn load(&self) -> BTreeMap<i64, LikeState> {
        match get_json(self.store.as_ref(), LIKES_KEY) {
            Ok(map) => map.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "ignoring unreadable like cache");
                BTreeMap::new()
            }
        }
    }

    #[must_use]
    pub fn get(&self, recipe_id: i64) -> Option<LikeState> {
        self.load().get(&recipe_id).copied()
    }

    pub fn record(&self, recipe_id: i64, state: LikeState) {
        let mut map = self.load();
        map.insert(recipe_id, state);
        if let Err(e) = set_json(self.store.as_ref(), LIKES_KEY, &map) {
            warn!(error = %e, recipe_id, "failed to persist like state");
        }
    }
}

impl DependentCache for LikesCache {
    fn label(&self) -> &'static str {
        "likes"
    }

    fn invalidate(&self) {
        if let Err(e) = self.store.remove(LIKES_KEY) {
            warn!(error = %e, "failed to clear like cache");
        }
    }
}

#[cfg(test)]
#[path = "scoped_test.rs"]
mod tests;
