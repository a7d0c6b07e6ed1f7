//! Arnica resource contract
//!
//! Types shared by everything that talks to an AQT Arnica resource, whether it
//! is the cloud portal or an in-process stand-in:
//!
//! - [`Transport`]: the request/response primitive the job engine is built on
//! - [`JobHandle`], [`ResourceIdentity`], [`Batch`]: identity of a submitted batch
//! - [`JobState`] and [`Progress`]: what a single result query reports
//! - [`RawResult`], [`Counts`], [`ExperimentResult`], [`AssembledResult`]: results
//! - [`wire`]: the JSON payloads of the REST API
//!
//! # Transports
//!
//! | Transport | Crate | Authentication |
//! |-----------|-------|----------------|
//! | Arnica portal | `arnica-adapter-portal` | `AQT_TOKEN` env var |
//! | Offline resource | `arnica-adapter-offline` | None |

pub mod error;
pub mod job;
pub mod result;
pub mod transport;
pub mod wire;

pub use error::{TransportError, TransportResult};
pub use job::{Batch, JobHandle, JobId, JobState, Progress, ResourceIdentity, ResourceType};
pub use result::{AssembledResult, CircuitOutcome, Counts, ExperimentResult, RawResult};
pub use transport::{Method, Request, Response, Transport};
