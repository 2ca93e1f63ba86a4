//! Background reconciliation of the session state.
//!
//! Server-side expiry, or a logout in another window, only becomes visible
//! when somebody asks the backend again. A forced probe on a fixed interval
//! bounds how long this client can show a stale session; results reach the
//! UI through the probe's phase channel and observer.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::probe::SessionProbe;

/// Spawn the reconciliation loop. The first check runs one interval after
/// the call. Abort the returned handle to stop it.
pub fn spawn_reconciler(probe: Arc<SessionProbe>) -> JoinHandle<()> {
    let interval = probe.config().reconcile_interval;
    info!(interval_ms = interval.as_millis(), "session reconciliation configured");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let snapshot = probe.get_session(true).await;
            debug!(
                signed_in = snapshot.as_ref().is_some_and(crate::snapshot::AuthSnapshot::is_authenticated),
                "session reconciled"
            );
        }
    })
}

#[cfg(test)]
#[path = "reconcile_test.rs"]
mod tests;
