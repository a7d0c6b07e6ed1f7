//! JSON payloads of the Arnica REST API (`/api/v1`).
//!
//! All angles on the wire are in units of π.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// `job_type` of circuit submissions.
pub const JOB_TYPE_QUANTUM_CIRCUIT: &str = "quantum_circuit";

/// Message of the unknown-job payload.
pub const UNKNOWN_JOB_MESSAGE: &str = "unknown job_id";

/// Path of the submission route.
pub fn submit_path(workspace: &str, resource: &str) -> String {
    format!("submit/{workspace}/{resource}")
}

/// Path of the result route.
pub fn result_path(job_id: &str) -> String {
    format!("result/{job_id}")
}

/// Path of the cancellation route.
pub fn cancel_path(job_id: &str) -> String {
    format!("jobs/{job_id}")
}

/// A single wire operation, tagged by `"operation"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation")]
pub enum WireOp {
    /// `RZ(φ·π)`.
    #[serde(rename = "RZ")]
    Rz {
        /// Target qubit.
        qubit: u32,
        /// Angle in units of π.
        phi: f64,
    },
    /// `R(θ·π, φ·π)`, θ ∈ [0, 1], φ ∈ [0, 2).
    #[serde(rename = "R")]
    R {
        /// Target qubit.
        qubit: u32,
        /// Rotation angle in units of π.
        theta: f64,
        /// Axis azimuth in units of π.
        phi: f64,
    },
    /// `exp(-i·θ·π/2·XX)`, θ ∈ [0, 0.5].
    #[serde(rename = "RXX")]
    Rxx {
        /// Target qubit pair.
        qubits: [u32; 2],
        /// Entangling angle in units of π.
        theta: f64,
    },
    /// Terminal measurement of all qubits.
    #[serde(rename = "MEASURE")]
    Measure,
}

/// One circuit of a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireCircuit {
    /// Shots.
    pub repetitions: u32,
    /// Qubits used by the circuit.
    pub number_of_qubits: u32,
    /// Operations, terminal `MEASURE` included.
    pub quantum_circuit: Vec<WireOp>,
}

/// Circuits of a submission, in submission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantumCircuits {
    /// Circuits.
    pub circuits: Vec<WireCircuit>,
}

/// Body of `POST submit/{workspace}/{resource}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSubmission {
    /// Always [`JOB_TYPE_QUANTUM_CIRCUIT`].
    pub job_type: String,
    /// Free-form label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Circuits.
    pub payload: QuantumCircuits,
}

impl JobSubmission {
    /// A circuit submission.
    pub fn new(circuits: Vec<WireCircuit>, label: Option<String>) -> Self {
        Self {
            job_type: JOB_TYPE_QUANTUM_CIRCUIT.to_string(),
            label,
            payload: QuantumCircuits { circuits },
        }
    }
}

/// Job metadata echoed by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInfo {
    /// Assigned job id.
    pub job_id: String,
    /// Job type.
    #[serde(default)]
    pub job_type: String,
    /// Label, if any.
    #[serde(default)]
    pub label: Option<String>,
    /// Resource id.
    #[serde(default)]
    pub resource_id: String,
    /// Workspace id.
    #[serde(default)]
    pub workspace_id: String,
}

/// The `response` object, discriminated by `"status"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum StatusPayload {
    /// Waiting in the queue.
    Queued,
    /// Executing.
    Ongoing {
        /// Circuits completed so far.
        finished_count: usize,
    },
    /// Executed.
    Finished {
        /// Samples keyed by circuit index (`"0"`, `"1"`, ...).
        result: BTreeMap<String, Vec<Vec<u8>>>,
    },
    /// Failed.
    Error {
        /// Resource message.
        message: String,
    },
    /// Cancelled.
    Cancelled,
    /// A status this client does not know.
    #[serde(other)]
    Unrecognized,
}

/// Job metadata plus status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResponse {
    /// Job metadata.
    pub job: JobInfo,
    /// Status.
    pub response: StatusPayload,
}

/// Answer to a result query for an id the resource does not know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnknownJob {
    /// Queried id.
    pub job_id: String,
    /// Always [`UNKNOWN_JOB_MESSAGE`].
    pub message: String,
}

/// Body of `GET result/{job_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultResponse {
    /// Known job.
    Job(JobResponse),
    /// Unknown job.
    UnknownJob(UnknownJob),
}
