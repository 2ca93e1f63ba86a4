//! Shared fixtures for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::api::{IdentityApi, ProfileUpdate};
use crate::config::ProbeConfig;
use crate::error::ProbeError;
use crate::probe::{SessionObserver, SessionProbe};
use crate::snapshot::{AuthSnapshot, SessionPhase, SessionUser};
use crate::store::MemoryStore;

// =============================================================================
// MockApi
// =============================================================================

/// Scripted identity backend. Queued identity results are returned in order;
/// once the queue is empty every check answers "signed in as alice".
pub(crate) struct MockApi {
    identity: Mutex<VecDeque<Result<AuthSnapshot, ProbeError>>>,
    logout_result: Mutex<Option<Result<(), ProbeError>>>,
    profile_result: Mutex<Option<Result<SessionUser, ProbeError>>>,
    delay: Duration,
    pub(crate) identity_calls: AtomicUsize,
    pub(crate) logout_calls: AtomicUsize,
}

impl MockApi {
    pub(crate) fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    /// Every identity check takes `delay` of (tokio) time.
    pub(crate) fn with_delay(delay: Duration) -> Self {
        Self {
            identity: Mutex::new(VecDeque::new()),
            logout_result: Mutex::new(None),
            profile_result: Mutex::new(None),
            delay,
            identity_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn push_identity(&self, result: Result<AuthSnapshot, ProbeError>) {
        self.identity.lock().unwrap().push_back(result);
    }

    pub(crate) fn set_logout(&self, result: Result<(), ProbeError>) {
        *self.logout_result.lock().unwrap() = Some(result);
    }

    pub(crate) fn set_profile(&self, result: Result<SessionUser, ProbeError>) {
        *self.profile_result.lock().unwrap() = Some(result);
    }

    pub(crate) fn calls(&self) -> usize {
        self.identity_calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IdentityApi for MockApi {
    async fn check_identity(&self) -> Result<AuthSnapshot, ProbeError> {
        self.identity_calls.fetch_add(1, Ordering::SeqCst);
        let next = self.identity.lock().unwrap().pop_front();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        next.unwrap_or_else(|| Ok(alice()))
    }

    async fn logout(&self) -> Result<(), ProbeError> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        self.logout_result.lock().unwrap().take().unwrap_or(Ok(()))
    }

    async fn update_profile(&self, update: &ProfileUpdate) -> Result<SessionUser, ProbeError> {
        let scripted = self.profile_result.lock().unwrap().take();
        scripted.unwrap_or_else(|| {
            Ok(SessionUser::named(update.username.clone().unwrap_or_else(|| "alice".into())))
        })
    }
}

// =============================================================================
// RecordingObserver
// =============================================================================

#[derive(Default)]
pub(crate) struct RecordingObserver {
    pub(crate) phases: Mutex<Vec<SessionPhase>>,
}

impl RecordingObserver {
    pub(crate) fn phases(&self) -> Vec<SessionPhase> {
        self.phases.lock().unwrap().clone()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_session_change(&self, phase: &SessionPhase) {
        self.phases.lock().unwrap().push(phase.clone());
    }
}

// =============================================================================
// Fixtures
// =============================================================================

pub(crate) fn alice() -> AuthSnapshot {
    AuthSnapshot::signed_in(SessionUser::named("alice"))
}

pub(crate) fn server_error() -> ProbeError {
    ProbeError::Status { status: 500, body: "Internal Server Error".into() }
}

/// Probe wired to in-memory stores and a recording observer.
pub(crate) struct Harness {
    pub(crate) api: Arc<MockApi>,
    pub(crate) persistent: Arc<MemoryStore>,
    pub(crate) ephemeral: Arc<MemoryStore>,
    pub(crate) observer: Arc<RecordingObserver>,
    pub(crate) probe: Arc<SessionProbe>,
}

impl Harness {
    pub(crate) fn new(api: MockApi) -> Self {
        Self::with_stores(api, Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    pub(crate) fn with_stores(api: MockApi, persistent: Arc<MemoryStore>, ephemeral: Arc<MemoryStore>) -> Self {
        let api = Arc::new(api);
        let observer = Arc::new(RecordingObserver::default());
        let probe = SessionProbe::new(api.clone(), persistent.clone(), ephemeral.clone(), ProbeConfig::default())
            .with_observer(observer.clone());
        Self { api, persistent, ephemeral, observer, probe: Arc::new(probe) }
    }
}
