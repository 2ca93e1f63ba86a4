//! Client-side session coordination for the Cookly recipe site.
//!
//! ARCHITECTURE
//! ============
//! `SessionProbe` owns every piece of session state the client keeps: the
//! short-lived probe cache, its per-tab mirror, the long-lived fallback hint,
//! and the list of identity-scoped caches to drop on logout. The backend is
//! reached through the `IdentityApi` trait and storage through
//! `KeyValueStore`, so both can be swapped in tests.

pub mod api;
pub mod config;
pub mod error;
pub mod fallback;
pub mod probe;
pub mod reconcile;
pub mod scoped;
pub mod snapshot;
pub mod store;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use api::{HttpIdentityApi, IdentityApi, ProfileUpdate};
pub use config::ProbeConfig;
pub use error::{ProbeError, StoreError};
pub use probe::{SessionObserver, SessionProbe};
pub use snapshot::{AuthSnapshot, SessionPhase, SessionUser};
