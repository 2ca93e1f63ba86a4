//! Session probe: single coordinated view of "who am I".
//!
//! DESIGN
//! ======
//! One `SessionProbe` is built per application and shared by `Arc`. Every
//! caller goes through `get_session`, which decides under one short lock
//! whether to:
//!
//! - attach to the probe already in flight (single-slot `watch` broadcast),
//! - reuse the last completed result while it is inside the freshness window,
//! - or start the one remote identity check everybody else will attach to.
//!
//! The lock is never held across an `.await`. The in-flight slot is released
//! by a drop guard, so a cancelled or panicking probe cannot leave later
//! callers waiting on a result that will never arrive.
//!
//! TRADE-OFFS
//! ==========
//! Waiting on an in-flight probe is bounded (`wait_bound`). A caller that
//! times out probes on its own, accepting a duplicate request over blocking
//! behind a hung one. Probe failures fail closed: the caller sees a
//! signed-out snapshot, the short-lived cache is left alone, and a
//! non-forced call inside the window reports "unknown" (`None`).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::{IdentityApi, ProfileUpdate};
use crate::config::ProbeConfig;
use crate::error::ProbeError;
use crate::fallback::{self, epoch_ms};
use crate::scoped::{DependentCache, LIKES_KEY};
use crate::snapshot::{AuthSnapshot, SessionPhase};
use crate::store::KeyValueStore;

// =============================================================================
// TYPES
// =============================================================================

/// Hook owned by presentation code, called after every phase change.
pub trait SessionObserver: Send + Sync {
    fn on_session_change(&self, phase: &SessionPhase);
}

/// Short-lived memo of the last successful probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeCacheEntry {
    pub snapshot: AuthSnapshot,
    pub captured_at: Instant,
}

type ProbeSlot = Option<AuthSnapshot>;

struct InFlight {
    id: u64,
    epoch: u64,
    done: watch::Receiver<ProbeSlot>,
}

#[derive(Default)]
struct ProbeState {
    cache: Option<ProbeCacheEntry>,
    last_probe_at: Option<Instant>,
    in_flight: Option<InFlight>,
    next_probe_id: u64,
    /// Bumped on logout and identity invalidation; probes started under an
    /// older epoch fail closed.
    identity_epoch: u64,
}

enum Plan {
    Wait(watch::Receiver<ProbeSlot>),
    Reuse(Option<AuthSnapshot>),
    Probe { id: u64, epoch: u64, done: watch::Sender<ProbeSlot> },
}

// =============================================================================
// SESSION PROBE
// =============================================================================

pub struct SessionProbe {
    api: Arc<dyn IdentityApi>,
    /// Survives restarts: fallback record and like cache.
    persistent: Arc<dyn KeyValueStore>,
    /// Per-tab: mirror of the short-lived cache.
    ephemeral: Arc<dyn KeyValueStore>,
    config: ProbeConfig,
    state: Mutex<ProbeState>,
    phase: watch::Sender<SessionPhase>,
    observer: Option<Arc<dyn SessionObserver>>,
    dependents: Mutex<Vec<Arc<dyn DependentCache>>>,
}

impl SessionProbe {
    /// Build a probe and hydrate its short-lived cache from a mirror that is
    /// still inside the freshness window.
    #[must_use]
    pub fn new(
        api: Arc<dyn IdentityApi>,
        persistent: Arc<dyn KeyValueStore>,
        ephemeral: Arc<dyn KeyValueStore>,
        config: ProbeConfig,
    ) -> Self {
        let mut state = ProbeState::default();
        let now_ms = epoch_ms();
        if let Some(mirror) = fallback::read_mirror_at(ephemeral.as_ref(), now_ms, config.freshness) {
            let age = Duration::from_millis(now_ms.saturating_sub(mirror.captured_at_ms));
            let captured_at = Instant::now().checked_sub(age).unwrap_or_else(Instant::now);
            debug!(age_ms = age.as_millis(), "hydrated probe cache from mirror");
            state.cache = Some(ProbeCacheEntry { snapshot: mirror.snapshot, captured_at });
            state.last_probe_at = Some(captured_at);
        }

        let (phase, _) = watch::channel(SessionPhase::Unresolved);
        Self {
            api,
            persistent,
            ephemeral,
            config,
            state: Mutex::new(state),
            phase,
            observer: None,
            dependents: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    #[must_use]
    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Register a cache that must be dropped whenever the identity is reset.
    pub fn register_dependent(&self, cache: Arc<dyn DependentCache>) {
        self.dependents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(cache);
    }

    /// Subscribe to phase transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.phase.subscribe()
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase.borrow().clone()
    }

    /// Copy of the short-lived cache entry, if any.
    #[must_use]
    pub fn cached(&self) -> Option<ProbeCacheEntry> {
        self.lock_state().cache.clone()
    }

    fn lock_state(&self) -> MutexGuard<'_, ProbeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -------------------------------------------------------------------------
    // get_session
    // -------------------------------------------------------------------------

    /// Current authentication state.
    ///
    /// Returns `None` ("unknown") only for a non-forced call inside the
    /// freshness window when no snapshot is cached, e.g. right after a failed
    /// probe. Callers must not change UI state on `None`. Forced calls always
    /// return `Some`.
    pub async fn get_session(&self, force_refresh: bool) -> Option<AuthSnapshot> {
        let mut may_wait = true;
        loop {
            match self.plan(force_refresh, may_wait) {
                Plan::Wait(done) => {
                    if let Some(snapshot) = self.wait_for(done).await {
                        return Some(snapshot);
                    }
                    may_wait = false;
                }
                Plan::Reuse(cached) => return cached,
                Plan::Probe { id, epoch, done } => return Some(self.run_probe(id, epoch, done).await),
            }
        }
    }

    fn plan(&self, force_refresh: bool, may_wait: bool) -> Plan {
        let mut state = self.lock_state();

        if may_wait {
            if let Some(in_flight) = state.in_flight.as_ref().filter(|f| f.epoch == state.identity_epoch) {
                return Plan::Wait(in_flight.done.clone());
            }
        }

        let freshness = self.config.freshness;
        if !force_refresh && state.last_probe_at.is_some_and(|at| at.elapsed() < freshness) {
            let cached = state
                .cache
                .as_ref()
                .filter(|entry| entry.captured_at.elapsed() < freshness)
                .map(|entry| entry.snapshot.clone());
            debug!(hit = cached.is_some(), "reusing recent identity check");
            return Plan::Reuse(cached);
        }

        let id = state.next_probe_id;
        state.next_probe_id += 1;
        let (done, rx) = watch::channel(None);
        let epoch = state.identity_epoch;
        state.in_flight = Some(InFlight { id, epoch, done: rx });
        Plan::Probe { id, epoch, done }
    }

    async fn wait_for(&self, mut done: watch::Receiver<ProbeSlot>) -> Option<AuthSnapshot> {
        debug!("identity check already in flight; waiting");
        let outcome = tokio::time::timeout(self.config.wait_bound, done.wait_for(Option::is_some)).await;
        match outcome {
            Ok(Ok(slot)) => slot.clone(),
            Ok(Err(_)) => {
                debug!("in-flight identity check was dropped");
                None
            }
            Err(_) => {
                warn!(
                    wait_ms = self.config.wait_bound.as_millis(),
                    "in-flight identity check exceeded wait bound; probing independently"
                );
                None
            }
        }
    }

    async fn run_probe(&self, id: u64, epoch: u64, done: watch::Sender<ProbeSlot>) -> AuthSnapshot {
        let _release = InFlightRelease { state: &self.state, id };

        debug!(probe_id = id, "checking identity");
        let outcome = self.api.check_identity().await;

        let (snapshot, accepted, stale) = {
            let mut state = self.lock_state();
            let stale = state.identity_epoch != epoch;
            if state.in_flight.as_ref().is_some_and(|f| f.id == id) {
                state.in_flight = None;
            }
            if !stale {
                state.last_probe_at = Some(Instant::now());
            }

            match outcome {
                Ok(_) if stale => {
                    debug!(probe_id = id, "identity reset during check; discarding result");
                    (AuthSnapshot::signed_out(), false, true)
                }
                Ok(snapshot) => {
                    state.cache = Some(ProbeCacheEntry { snapshot: snapshot.clone(), captured_at: Instant::now() });
                    (snapshot, true, false)
                }
                Err(e) => {
                    warn!(probe_id = id, error = %e, "identity check failed; treating session as signed out");
                    (AuthSnapshot::signed_out(), false, stale)
                }
            }
        };

        if accepted {
            let now_ms = epoch_ms();
            fallback::mirror_snapshot(self.ephemeral.as_ref(), &snapshot, now_ms);
            fallback::remember_snapshot(self.persistent.as_ref(), &snapshot, now_ms);
        }

        done.send_replace(Some(snapshot.clone()));
        if !stale {
            self.publish(SessionPhase::Authoritative(snapshot.clone()));
        }
        snapshot
    }

    // -------------------------------------------------------------------------
    // Startup
    // -------------------------------------------------------------------------

    /// Startup sequence: render the fallback optimistically if one is valid,
    /// then reconcile with a forced probe. The forced probe always wins.
    pub async fn bootstrap(&self) -> AuthSnapshot {
        match fallback::restore_fallback(self.persistent.as_ref(), self.config.fallback_ttl) {
            Some(hint) => {
                info!(username = %hint.username, "restoring session hint from fallback");
                self.publish_optimistic(hint);
                tokio::time::sleep(self.config.bootstrap_delay).await;
            }
            None => debug!("no usable session fallback"),
        }
        self.get_session(true)
            .await
            .unwrap_or_else(AuthSnapshot::signed_out)
    }

    // -------------------------------------------------------------------------
    // Identity mutations
    // -------------------------------------------------------------------------

    /// Log out and drop every identity-scoped cache.
    ///
    /// Local state is cleared even when the backend call fails so the UI is
    /// never stuck looking signed in. The error is still returned so the
    /// caller can tell the user.
    ///
    /// # Errors
    ///
    /// Returns the transport error, or `LogoutRejected` if the backend
    /// answered `success: false`.
    pub async fn logout(&self) -> Result<(), ProbeError> {
        let outcome = self.api.logout().await;
        if let Err(e) = &outcome {
            warn!(error = %e, "logout not acknowledged; clearing local session anyway");
        }

        {
            let mut state = self.lock_state();
            state.cache = None;
            state.last_probe_at = None;
            state.identity_epoch += 1;
        }
        fallback::clear_mirror(self.ephemeral.as_ref());
        fallback::clear_fallback(self.persistent.as_ref());
        if let Err(e) = self.persistent.remove(LIKES_KEY) {
            warn!(error = %e, "failed to clear like cache");
        }
        self.invalidate_dependents();

        info!("session cleared");
        self.publish(SessionPhase::Authoritative(AuthSnapshot::signed_out()));
        outcome
    }

    /// Forget the short-lived result so the next call asks the backend.
    ///
    /// A check already in flight belongs to the old identity: its result is
    /// discarded and later callers start a new one instead of waiting on it.
    pub fn invalidate_identity(&self) {
        {
            let mut state = self.lock_state();
            state.cache = None;
            state.last_probe_at = None;
            state.identity_epoch += 1;
        }
        fallback::clear_mirror(self.ephemeral.as_ref());
    }

    /// Update the profile, then return a freshly probed snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the update or is unreachable.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<AuthSnapshot, ProbeError> {
        let user = self.api.update_profile(update).await?;
        info!(username = %user.username, "profile updated");
        self.invalidate_identity();
        Ok(self
            .get_session(true)
            .await
            .unwrap_or_else(|| AuthSnapshot::signed_in(user)))
    }

    fn invalidate_dependents(&self) {
        let dependents = self
            .dependents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for cache in dependents {
            debug!(cache = cache.label(), "invalidating identity-scoped cache");
            cache.invalidate();
        }
    }

    // -------------------------------------------------------------------------
    // Publishing
    // -------------------------------------------------------------------------

    fn publish(&self, next: SessionPhase) {
        let previous = self.phase.send_replace(next.clone());
        if previous.shows_signed_in() != next.shows_signed_in() || !previous.is_authoritative() {
            info!(
                signed_in = next.shows_signed_in(),
                username = next.display_name().unwrap_or("-"),
                "session state resolved"
            );
        }
        if let Some(observer) = &self.observer {
            observer.on_session_change(&next);
        }
    }

    fn publish_optimistic(&self, hint: fallback::PersistentAuthFallback) {
        let next = SessionPhase::Optimistic(hint);
        let published = self.phase.send_if_modified(|phase| {
            if phase.is_authoritative() {
                false
            } else {
                *phase = next.clone();
                true
            }
        });
        if published {
            if let Some(observer) = &self.observer {
                observer.on_session_change(&next);
            }
        }
    }
}

// =============================================================================
// IN-FLIGHT RELEASE
// =============================================================================

/// Clears the in-flight slot if the owning probe ends without completing.
struct InFlightRelease<'a> {
    state: &'a Mutex<ProbeState>,
    id: u64,
}

impl Drop for InFlightRelease<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.in_flight.as_ref().is_some_and(|f| f.id == self.id) {
            state.in_flight = None;
        }
    }
}

#[cfg(test)]
#[path = "probe_test.rs"]
mod tests;
