//! HTTP transport for the AQT Arnica portal
//!
//! [`PortalClient`] implements [`arnica_hal::Transport`] against the Arnica
//! cloud REST API (`https://arnica.aqt.eu/api/v1`). It only moves JSON; job
//! semantics live in `arnica-jobs`.
//!
//! # Resources
//!
//! | Workspace        | Resource                      | Type              | Qubits |
//! |------------------|-------------------------------|-------------------|--------|
//! | `default`        | `offline_simulator_no_noise`  | offline_simulator | 20     |
//! | `default`        | `offline_simulator_noise`     | offline_simulator | 20     |
//! | `aqt_simulators` | `simulator_noise`             | simulator         | 20     |
//! | *(account)*      | `ibex`                        | device            | 12     |
//!
//! # Authentication
//!
//! The Bearer token comes from `AQT_TOKEN`, or from the variable named by
//! `portal.token_env` when built with [`PortalClient::from_config`].
//!
//! # Example
//!
//! ```no_run
//! use arnica_adapter_portal::PortalClient;
//! use arnica_hal::ResourceIdentity;
//! use arnica_jobs::JobEngine;
//!
//! # async fn run(circuits: Vec<arnica_ir::CircuitSpec>) -> Result<(), Box<dyn std::error::Error>> {
//! let engine = JobEngine::new(PortalClient::new()?);
//! let resource = ResourceIdentity::offline_simulator("offline_simulator_no_noise");
//! let handle = engine.submit(circuits, 200, &resource).await?;
//! let result = engine.wait(&handle, engine.wait_options()).await?;
//! println!("{:?}", result.counts(0));
//! # Ok(())
//! # }
//! ```

mod client;
mod error;

pub use client::{DEFAULT_TIMEOUT, PortalClient};
pub use error::{PortalError, PortalResult};
