use super::*;
use std::sync::Mutex;

/// Serializes tests that mutate `SESSION_PROBE_*` variables.
static ENV_LOCK: Mutex<()> = Mutex::new(());

/// # Safety
/// Callers must hold `ENV_LOCK`.
unsafe fn clear_probe_env() {
    unsafe {
        std::env::remove_var("SESSION_PROBE_BASE_URL");
        std::env::remove_var("SESSION_PROBE_FRESHNESS_MS");
        std::env::remove_var("SESSION_PROBE_WAIT_BOUND_MS");
        std::env::remove_var("SESSION_PROBE_FALLBACK_TTL_SECS");
        std::env::remove_var("SESSION_PROBE_RECONCILE_MS");
        std::env::remove_var("SESSION_PROBE_BOOTSTRAP_DELAY_MS");
        std::env::remove_var("SESSION_PROBE_REQUEST_TIMEOUT_SECS");
        std::env::remove_var("SESSION_PROBE_CONNECT_TIMEOUT_SECS");
    }
}

#[test]
fn from_env_defaults() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe { clear_probe_env() };

    let cfg = ProbeConfig::from_env();
    assert_eq!(cfg, ProbeConfig::default());
    assert_eq!(cfg.freshness, Duration::from_millis(2000));
    assert_eq!(cfg.wait_bound, Duration::from_millis(2000));
    assert_eq!(cfg.fallback_ttl, Duration::from_secs(86_400));
    assert_eq!(cfg.reconcile_interval, Duration::from_millis(5000));
}

#[test]
fn from_env_parses_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_probe_env();
        std::env::set_var("SESSION_PROBE_BASE_URL", "https://cookly.example/");
        std::env::set_var("SESSION_PROBE_FRESHNESS_MS", "750");
        std::env::set_var("SESSION_PROBE_REQUEST_TIMEOUT_SECS", "3");
    }

    let cfg = ProbeConfig::from_env();
    assert_eq!(cfg.base_url, "https://cookly.example");
    assert_eq!(cfg.freshness, Duration::from_millis(750));
    assert_eq!(cfg.timeouts.request, Duration::from_secs(3));
    assert_eq!(cfg.timeouts.connect, Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS));

    unsafe { clear_probe_env() };
}

#[test]
fn from_env_ignores_unparseable_numbers() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_probe_env();
        std::env::set_var("SESSION_PROBE_WAIT_BOUND_MS", "soon");
    }

    let cfg = ProbeConfig::from_env();
    assert_eq!(cfg.wait_bound, Duration::from_millis(DEFAULT_WAIT_BOUND_MS));

    unsafe { clear_probe_env() };
}

#[test]
fn with_base_url_trims_trailing_slash() {
    let cfg = ProbeConfig::default().with_base_url("http://localhost:8080///");
    assert_eq!(cfg.base_url, "http://localhost:8080");
}
