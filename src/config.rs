//! Probe configuration parsed from environment variables.

use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_FRESHNESS_MS: u64 = 2000;
pub const DEFAULT_WAIT_BOUND_MS: u64 = 2000;
pub const DEFAULT_FALLBACK_TTL_SECS: u64 = 86_400;
pub const DEFAULT_RECONCILE_MS: u64 = 5000;
pub const DEFAULT_BOOTSTRAP_DELAY_MS: u64 = 1000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    pub request: Duration,
    pub connect: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Backend origin, without trailing slash.
    pub base_url: String,
    /// How long a completed probe may be reused without a remote call.
    pub freshness: Duration,
    /// How long a caller waits on an in-flight probe before probing itself.
    pub wait_bound: Duration,
    /// Lifetime of the persistent fallback record.
    pub fallback_ttl: Duration,
    /// Interval of the background forced reconciliation.
    pub reconcile_interval: Duration,
    /// Delay between the optimistic render and the first forced probe.
    pub bootstrap_delay: Duration,
    pub timeouts: HttpTimeouts,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            freshness: Duration::from_millis(DEFAULT_FRESHNESS_MS),
            wait_bound: Duration::from_millis(DEFAULT_WAIT_BOUND_MS),
            fallback_ttl: Duration::from_secs(DEFAULT_FALLBACK_TTL_SECS),
            reconcile_interval: Duration::from_millis(DEFAULT_RECONCILE_MS),
            bootstrap_delay: Duration::from_millis(DEFAULT_BOOTSTRAP_DELAY_MS),
            timeouts: HttpTimeouts {
                request: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
                connect: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            },
        }
    }
}

impl ProbeConfig {
    /// Build config from environment variables. Every variable is optional:
    ///
    /// - `SESSION_PROBE_BASE_URL`: default `http://127.0.0.1:5000`
    /// - `SESSION_PROBE_FRESHNESS_MS`: default 2000
    /// - `SESSION_PROBE_WAIT_BOUND_MS`: default 2000
    /// - `SESSION_PROBE_FALLBACK_TTL_SECS`: default 86400
    /// - `SESSION_PROBE_RECONCILE_MS`: default 5000
    /// - `SESSION_PROBE_BOOTSTRAP_DELAY_MS`: default 1000
    /// - `SESSION_PROBE_REQUEST_TIMEOUT_SECS`: default 10
    /// - `SESSION_PROBE_CONNECT_TIMEOUT_SECS`: default 5
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = std::env::var("SESSION_PROBE_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            freshness: Duration::from_millis(env_parse("SESSION_PROBE_FRESHNESS_MS", DEFAULT_FRESHNESS_MS)),
            wait_bound: Duration::from_millis(env_parse("SESSION_PROBE_WAIT_BOUND_MS", DEFAULT_WAIT_BOUND_MS)),
            fallback_ttl: Duration::from_secs(env_parse("SESSION_PROBE_FALLBACK_TTL_SECS", DEFAULT_FALLBACK_TTL_SECS)),
            reconcile_interval: Duration::from_millis(env_parse("SESSION_PROBE_RECONCILE_MS", DEFAULT_RECONCILE_MS)),
            bootstrap_delay: Duration::from_millis(env_parse(
                "SESSION_PROBE_BOOTSTRAP_DELAY_MS",
                DEFAULT_BOOTSTRAP_DELAY_MS,
            )),
            timeouts: HttpTimeouts {
                request: Duration::from_secs(env_parse(
                    "SESSION_PROBE_REQUEST_TIMEOUT_SECS",
                    DEFAULT_REQUEST_TIMEOUT_SECS,
                )),
                connect: Duration::from_secs(env_parse(
                    "SESSION_PROBE_CONNECT_TIMEOUT_SECS",
                    DEFAULT_CONNECT_TIMEOUT_SECS,
                )),
            },
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_owned();
        self
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
