//! Job identity and lifecycle types.
//!
//! The state machine reported by result queries:
//!
//! ```text
//!   submit() ──→ Queued ──→ Ongoing{n} ──→ Finished
//!                  │            │
//!                  │            ├──→ Error(message)
//!                  │            │
//!                  └────────────┴──→ Cancelled
//!
//!   any state ──→ Unknown   (job id no longer recognized)
//! ```
//!
//! **Invariants:**
//! - `Finished`, `Error`, `Cancelled` and `Unknown` are terminal.
//! - `Ongoing.finished_count` never decreases for one job.
//! - A [`JobHandle`] is never mutated after submission; the state is always
//!   re-derived from the resource.

use std::collections::BTreeMap;

use arnica_ir::CircuitSpec;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::result::RawResult;

/// Opaque job identifier assigned by the resource at submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create a new job ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Kind of execution resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// Trapped-ion hardware.
    Device,
    /// Simulator hosted by the portal.
    Simulator,
    /// Simulator running in the submitting process.
    OfflineSimulator,
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceType::Device => write!(f, "device"),
            ResourceType::Simulator => write!(f, "simulator"),
            ResourceType::OfflineSimulator => write!(f, "offline_simulator"),
        }
    }
}

/// A `(workspace, resource)` pair plus what the encoder needs to know about it.
///
/// Obtained from a directory listing and passed explicitly to `submit`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceIdentity {
    /// Workspace identifier.
    pub workspace_id: String,
    /// Resource identifier within the workspace.
    pub resource_id: String,
    /// Kind of resource.
    pub resource_type: ResourceType,
    /// Qubits available on the resource.
    pub available_qubits: u32,
}

impl ResourceIdentity {
    /// Qubits of the ion-trap devices and simulators exposed by the portal.
    pub const DEFAULT_QUBITS: u32 = 20;

    /// Identify a resource.
    pub fn new(
        workspace_id: impl Into<String>,
        resource_id: impl Into<String>,
        resource_type: ResourceType,
    ) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            resource_id: resource_id.into(),
            resource_type,
            available_qubits: Self::DEFAULT_QUBITS,
        }
    }

    /// The in-process simulator in the `default` workspace.
    pub fn offline_simulator(resource_id: impl Into<String>) -> Self {
        Self::new("default", resource_id, ResourceType::OfflineSimulator)
    }

    /// Override the number of available qubits.
    #[must_use]
    pub fn with_qubits(mut self, available_qubits: u32) -> Self {
        self.available_qubits = available_qubits;
        self
    }
}

impl std::fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.workspace_id, self.resource_id)
    }
}

/// The circuits of one submission, with their shared run options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    /// Circuits in submission order.
    pub circuits: Vec<CircuitSpec>,
    /// Repetitions of each circuit.
    pub shots: u32,
    /// Whether per-shot memory is reported alongside counts.
    #[serde(default)]
    pub memory: bool,
}

impl Batch {
    /// A batch without per-shot memory.
    pub fn new(circuits: Vec<CircuitSpec>, shots: u32) -> Self {
        Self {
            circuits,
            shots,
            memory: false,
        }
    }

    /// Request per-shot memory.
    #[must_use]
    pub fn with_memory(mut self, memory: bool) -> Self {
        self.memory = memory;
        self
    }

    /// Number of circuits.
    pub fn len(&self) -> usize {
        self.circuits.len()
    }

    /// Whether the batch holds no circuit.
    pub fn is_empty(&self) -> bool {
        self.circuits.is_empty()
    }
}

/// Identity of one submitted batch.
///
/// Holds a copy of the batch so results can be assembled after a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobHandle {
    job_id: JobId,
    resource: ResourceIdentity,
    submitted_at: DateTime<Utc>,
    batch: Batch,
}

impl JobHandle {
    /// Create a handle stamped with the current time.
    pub fn new(job_id: JobId, resource: ResourceIdentity, batch: Batch) -> Self {
        Self::with_submitted_at(job_id, resource, batch, Utc::now())
    }

    /// Create a handle with an explicit submission time.
    pub fn with_submitted_at(
        job_id: JobId,
        resource: ResourceIdentity,
        batch: Batch,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id,
            resource,
            submitted_at,
            batch,
        }
    }

    /// Job identifier.
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Resource the batch was submitted to.
    pub fn resource(&self) -> &ResourceIdentity {
        &self.resource
    }

    /// Submission timestamp.
    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    /// Submitted batch.
    pub fn batch(&self) -> &Batch {
        &self.batch
    }

    /// Number of circuits in the batch.
    pub fn circuit_count(&self) -> usize {
        self.batch.len()
    }
}

/// What one result query reports about a job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    /// Waiting in the resource queue.
    Queued,
    /// Executing; `finished_count` circuits are done.
    Ongoing {
        /// Circuits that completed so far.
        finished_count: usize,
    },
    /// All circuits executed.
    Finished {
        /// Per-circuit samples keyed by submission index.
        results: BTreeMap<usize, RawResult>,
    },
    /// The resource reported a failure.
    Error {
        /// Resource-supplied message, verbatim.
        message: String,
    },
    /// The job was cancelled.
    Cancelled,
    /// The resource does not recognize the job id.
    Unknown,
}

impl JobState {
    /// Whether no further transition can happen.
    pub fn is_terminal(&self) -> bool {
        !self.is_pending()
    }

    /// Whether the job is queued or running.
    pub fn is_pending(&self) -> bool {
        matches!(self, JobState::Queued | JobState::Ongoing { .. })
    }

    /// Short name of the state.
    pub fn name(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Ongoing { .. } => "ongoing",
            JobState::Finished { .. } => "finished",
            JobState::Error { .. } => "error",
            JobState::Cancelled => "cancelled",
            JobState::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Ongoing { finished_count } => {
                write!(f, "ongoing ({finished_count} finished)")
            }
            JobState::Error { message } => write!(f, "error: {message}"),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// Completion progress of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    /// Circuits completed.
    pub finished_count: usize,
    /// Circuits in the batch.
    pub total_count: usize,
}

impl Progress {
    /// Derive progress from a polled state.
    pub fn from_state(state: &JobState, total_count: usize) -> Self {
        let finished_count = match state {
            JobState::Queued => 0,
            JobState::Ongoing { finished_count } => (*finished_count).min(total_count),
            _ => total_count,
        };
        Self {
            finished_count,
            total_count,
        }
    }

    /// Whether every circuit completed.
    pub fn is_complete(&self) -> bool {
        self.finished_count >= self.total_count
    }
}

impl std::fmt::Display for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.finished_count, self.total_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> JobHandle {
        let mut circuit = CircuitSpec::new("one", 1);
        circuit.measure_all().unwrap();
        JobHandle::new(
            JobId::new("5bd3a2e0-0d39-4b5e-9d1c-6c8f0a4f1e21"),
            ResourceIdentity::offline_simulator("offline_simulator_no_noise"),
            Batch::new(vec![circuit.clone(), circuit], 100),
        )
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobState::Queued.is_terminal());
        assert!(!JobState::Ongoing { finished_count: 1 }.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
        assert!(JobState::Unknown.is_terminal());
        assert!(
            JobState::Error {
                message: "boom".into()
            }
            .is_terminal()
        );
        assert!(
            JobState::Finished {
                results: BTreeMap::new()
            }
            .is_terminal()
        );
    }

    #[test]
    fn test_progress_from_state() {
        assert_eq!(Progress::from_state(&JobState::Queued, 3).finished_count, 0);
        let p = Progress::from_state(&JobState::Ongoing { finished_count: 2 }, 3);
        assert_eq!(p.to_string(), "2/3");
        assert!(!p.is_complete());
        assert!(Progress::from_state(&JobState::Cancelled, 3).is_complete());
        let over = Progress::from_state(&JobState::Ongoing { finished_count: 9 }, 3);
        assert_eq!(over.finished_count, 3);
    }

    #[test]
    fn test_handle_serde_round_trip() {
        let handle = handle();
        let json = serde_json::to_string(&handle).unwrap();
        let back: JobHandle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, handle);
        assert_eq!(back.circuit_count(), 2);
        assert!(json.contains("\"offline_simulator\""));
    }

    #[test]
    fn test_resource_display() {
        let resource = ResourceIdentity::new("ws", "ibex", ResourceType::Device).with_qubits(12);
        assert_eq!(resource.to_string(), "ws/ibex");
        assert_eq!(resource.available_qubits, 12);
    }
}
