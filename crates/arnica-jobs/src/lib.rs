//! Arnica job lifecycle
//!
//! Turns a batch of native circuits into a job on an AQT Arnica resource and
//! brings its results back:
//!
//! 1. [`encoder`] checks the batch against resource limits and converts it to
//!    the wire format, without touching the network on failure.
//! 2. [`JobEngine::submit`] posts it and returns a [`JobHandle`] once queued.
//! 3. [`JobEngine::poll_once`] and [`JobEngine::wait`] follow the job through
//!    `queued → ongoing → finished | error | cancelled`, retrying transient
//!    transport failures with jittered exponential backoff.
//! 4. [`assembler`] re-keys every shot into the caller's classical-bit order
//!    (via [`resolver`]) and tallies counts.
//! 5. [`persistence`] checkpoints handles so a wait can resume in another
//!    process.
//!
//! # Example
//!
//! ```rust
//! use arnica_adapter_offline::OfflineResource;
//! use arnica_hal::ResourceIdentity;
//! use arnica_ir::{CircuitSpec, QubitId};
//! use arnica_jobs::{JobEngine, WaitOptions};
//! use std::f64::consts::PI;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = JobEngine::new(OfflineResource::new());
//! let resource = ResourceIdentity::offline_simulator("offline_simulator_no_noise");
//!
//! let mut bell = CircuitSpec::new("bell", 2);
//! bell.r(PI / 2.0, -PI / 2.0, QubitId(0))?;
//! bell.rxx(PI / 2.0, QubitId(0), QubitId(1))?;
//! bell.measure_all()?;
//!
//! let handle = engine.submit(vec![bell], 100, &resource).await?;
//! let result = engine
//!     .wait(&handle, WaitOptions::unbounded(Duration::from_millis(10)))
//!     .await?;
//!
//! assert!(result.success);
//! assert_eq!(result.results[0].counts.total_shots(), 100);
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub(crate) mod backoff;
pub mod config;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod progress;
pub mod resolver;
pub mod tracing_config;

pub use backoff::RetryPolicy;
pub use config::{EngineConfig, LoggingConfig, PollingConfig, PortalConfig, StoreConfig};
pub use encoder::Limits;
pub use engine::{JobEngine, WaitOptions};
pub use error::{JobsError, JobsResult};
pub use persistence::{CredentialsRef, HandleStore, JsonStore, MemoryStore, PersistedRecord};
pub use progress::{NoProgress, ProgressBarReporter, ProgressReporter};
pub use resolver::BitMapping;

pub use arnica_hal::{AssembledResult, Counts, ExperimentResult, JobHandle, JobId, JobState, Progress};
