//! Offline Arnica resource
//!
//! [`OfflineResource`] answers the Arnica REST routes in process, the way the
//! portal's `offline_simulator_*` resources do, without any quantum
//! simulation: shot samples come from a [`SampleSource`]. It is the transport
//! used by tests and local dry runs.
//!
//! Its lifecycle can be scripted: jobs can stay queued for a number of polls,
//! report per-circuit progress, end in an error, expire, or be preceded by
//! injected transport failures.

mod resource;

pub use resource::{DEFAULT_RESOURCE_ID, OfflineResource, SampleSource};
