use super::*;
use crate::snapshot::{AuthSnapshot, SessionPhase};
use crate::test_helpers::{Harness, MockApi, alice};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn reconciler_forces_a_check_every_interval() {
    let h = Harness::new(MockApi::new());

    let handle = spawn_reconciler(h.probe.clone());
    tokio::time::sleep(Duration::from_millis(4_900)).await;
    assert_eq!(h.api.calls(), 0);

    tokio::time::sleep(Duration::from_millis(5_200)).await;
    assert_eq!(h.api.calls(), 2);

    handle.abort();
}

#[tokio::test(start_paused = true)]
async fn reconciler_pushes_server_side_logout_to_observer() {
    let api = MockApi::new();
    api.push_identity(Ok(alice()));
    api.push_identity(Ok(AuthSnapshot::signed_out()));
    let h = Harness::new(api);

    let handle = spawn_reconciler(h.probe.clone());
    tokio::time::sleep(Duration::from_millis(10_100)).await;
    handle.abort();

    assert_eq!(
        h.observer.phases(),
        vec![SessionPhase::Authoritative(alice()), SessionPhase::Authoritative(AuthSnapshot::signed_out())]
    );
}
