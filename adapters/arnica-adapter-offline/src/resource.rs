//! Offline resource implementation.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use arnica_hal::wire::{
    JOB_TYPE_QUANTUM_CIRCUIT, JobInfo, JobResponse, JobSubmission, StatusPayload,
    UNKNOWN_JOB_MESSAGE, UnknownJob, WireCircuit,
};
use arnica_hal::{
    JobId, Method, Request, ResourceIdentity, Response, Transport, TransportError,
    TransportResult,
};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use tracing::{debug, instrument};
use uuid::Uuid;

/// Resource id answered by default.
pub const DEFAULT_RESOURCE_ID: &str = "offline_simulator_no_noise";

/// Where shot samples come from.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleSource {
    /// Every qubit reads 0.
    Zeros,
    /// Independent fair coin per qubit and shot.
    Random,
    /// Samples per circuit index, returned as given. Circuits without an
    /// entry read all zeros.
    Fixed(Vec<Vec<Vec<u8>>>),
}

struct OfflineJob {
    info: JobInfo,
    circuit_count: usize,
    polls: usize,
    cancelled: bool,
    results: BTreeMap<String, Vec<Vec<u8>>>,
}

/// In-process Arnica resource.
///
/// Jobs advance one step per result query: `queued` for the configured number
/// of polls, then (with stepwise progress) one `ongoing` report per circuit,
/// then `finished`, or `error` when a failure message is set.
pub struct OfflineResource {
    resource_id: String,
    max_qubits: u32,
    samples: SampleSource,
    queued_polls: usize,
    stepwise: bool,
    failure: Option<String>,
    rng: Mutex<StdRng>,
    jobs: Mutex<FxHashMap<String, OfflineJob>>,
    pending_failures: Mutex<VecDeque<TransportError>>,
    requests: AtomicUsize,
}

impl std::fmt::Debug for OfflineResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OfflineResource")
            .field("resource_id", &self.resource_id)
            .field("max_qubits", &self.max_qubits)
            .field("queued_polls", &self.queued_polls)
            .field("stepwise", &self.stepwise)
            .field("jobs", &self.job_count())
            .finish()
    }
}

impl OfflineResource {
    /// A resource answering `default/offline_simulator_no_noise` with random
    /// samples; jobs finish on the first query.
    pub fn new() -> Self {
        Self {
            resource_id: DEFAULT_RESOURCE_ID.to_string(),
            max_qubits: ResourceIdentity::DEFAULT_QUBITS,
            samples: SampleSource::Random,
            queued_polls: 0,
            stepwise: false,
            failure: None,
            rng: Mutex::new(StdRng::from_entropy()),
            jobs: Mutex::new(FxHashMap::default()),
            pending_failures: Mutex::new(VecDeque::new()),
            requests: AtomicUsize::new(0),
        }
    }

    /// Answer another resource id.
    #[must_use]
    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = resource_id.into();
        self
    }

    /// Reject circuits wider than `max_qubits`.
    #[must_use]
    pub fn with_max_qubits(mut self, max_qubits: u32) -> Self {
        self.max_qubits = max_qubits;
        self
    }

    /// Take samples from `samples`.
    #[must_use]
    pub fn with_samples(mut self, samples: SampleSource) -> Self {
        self.samples = samples;
        self
    }

    /// Seed the random sample source.
    #[must_use]
    pub fn with_seed(self, seed: u64) -> Self {
        *self.rng.lock().unwrap_or_else(std::sync::PoisonError::into_inner) =
            StdRng::seed_from_u64(seed);
        self
    }

    /// Report `queued` for the first `polls` result queries.
    #[must_use]
    pub fn with_queued_polls(mut self, polls: usize) -> Self {
        self.queued_polls = polls;
        self
    }

    /// Report `ongoing` with one more finished circuit per query.
    #[must_use]
    pub fn with_stepwise_progress(mut self) -> Self {
        self.stepwise = true;
        self
    }

    /// End every job in `error` with `message` once it leaves the queue.
    #[must_use]
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Make the next requests fail with `errors`, in order, before any of
    /// them reaches the resource.
    pub fn inject_failures(&self, errors: impl IntoIterator<Item = TransportError>) {
        self.pending_failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .extend(errors);
    }

    /// Forget a job, as the portal does once results expire. Returns whether
    /// the job existed.
    pub fn expire(&self, job_id: &JobId) -> bool {
        self.jobs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(job_id.as_str())
            .is_some()
    }

    /// Requests received so far, failed ones included.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Jobs currently known.
    pub fn job_count(&self) -> usize {
        self.jobs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    fn status_at(&self, job: &OfflineJob, poll: usize) -> StatusPayload {
        if job.cancelled {
            return StatusPayload::Cancelled;
        }
        if poll < self.queued_polls {
            return StatusPayload::Queued;
        }
        if let Some(message) = &self.failure {
            return StatusPayload::Error {
                message: message.clone(),
            };
        }
        let step = poll - self.queued_polls;
        if self.stepwise && step < job.circuit_count {
            return StatusPayload::Ongoing {
                finished_count: step,
            };
        }
        StatusPayload::Finished {
            result: job.results.clone(),
        }
    }

    fn sample(&self, index: usize, circuit: &WireCircuit) -> Vec<Vec<u8>> {
        let shots = circuit.repetitions as usize;
        let width = circuit.number_of_qubits as usize;
        match &self.samples {
            SampleSource::Zeros => vec![vec![0; width]; shots],
            SampleSource::Fixed(per_circuit) => per_circuit
                .get(index)
                .cloned()
                .unwrap_or_else(|| vec![vec![0; width]; shots]),
            SampleSource::Random => {
                let mut rng = self
                    .rng
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner);
                (0..shots)
                    .map(|_| (0..width).map(|_| rng.gen_range(0..=1u8)).collect())
                    .collect()
            }
        }
    }

    fn submit(&self, workspace: &str, resource: &str, body: Option<&Value>) -> Response {
        if resource != self.resource_id {
            return Response::new(404, json!({ "detail": format!("Resource '{resource}' not found") }));
        }

        let submission: JobSubmission = match body.map(|b| serde_json::from_value(b.clone())) {
            Some(Ok(submission)) => submission,
            Some(Err(e)) => return Response::new(422, json!({ "detail": e.to_string() })),
            None => return Response::new(422, json!({ "detail": "Missing request body" })),
        };
        if submission.job_type != JOB_TYPE_QUANTUM_CIRCUIT {
            return Response::new(
                422,
                json!({ "detail": format!("Unsupported job type '{}'", submission.job_type) }),
            );
        }

        let circuits = &submission.payload.circuits;
        if let Some(wide) = circuits
            .iter()
            .find(|c| c.number_of_qubits > self.max_qubits)
        {
            return Response::new(
                422,
                json!({ "detail": format!(
                    "number_of_qubits {} exceeds the {} qubits of {}",
                    wide.number_of_qubits, self.max_qubits, self.resource_id
                ) }),
            );
        }

        let results = circuits
            .iter()
            .enumerate()
            .map(|(i, circuit)| (i.to_string(), self.sample(i, circuit)))
            .collect();

        let info = JobInfo {
            job_id: Uuid::new_v4().to_string(),
            job_type: submission.job_type.clone(),
            label: submission.label.clone(),
            resource_id: resource.to_string(),
            workspace_id: workspace.to_string(),
        };
        debug!(job_id = %info.job_id, circuits = circuits.len(), "Queued offline job");

        let response = job_body(&info, StatusPayload::Queued);
        self.jobs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(
                info.job_id.clone(),
                OfflineJob {
                    info,
                    circuit_count: circuits.len(),
                    polls: 0,
                    cancelled: false,
                    results,
                },
            );
        Response::new(200, response)
    }

    fn result(&self, job_id: &str) -> Response {
        let mut jobs = self
            .jobs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(job) = jobs.get_mut(job_id) else {
            let unknown = UnknownJob {
                job_id: job_id.to_string(),
                message: UNKNOWN_JOB_MESSAGE.to_string(),
            };
            return Response::new(200, serde_json::to_value(unknown).unwrap_or(Value::Null));
        };

        let status = self.status_at(job, job.polls);
        job.polls += 1;
        Response::new(200, job_body(&job.info, status))
    }

    fn cancel(&self, job_id: &str) -> Response {
        let mut jobs = self
            .jobs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(job) = jobs.get_mut(job_id) else {
            return Response::new(404, json!({ "detail": "Job not found" }));
        };

        match self.status_at(job, job.polls) {
            StatusPayload::Cancelled => Response::new(208, Value::Null),
            StatusPayload::Finished { .. } | StatusPayload::Error { .. } => Response::new(
                403,
                json!({ "detail": "Job already finished and cannot be cancelled" }),
            ),
            _ => {
                job.cancelled = true;
                debug!(job_id, "Cancelled offline job");
                Response::empty(204)
            }
        }
    }
}

impl Default for OfflineResource {
    fn default() -> Self {
        Self::new()
    }
}

fn job_body(info: &JobInfo, response: StatusPayload) -> Value {
    serde_json::to_value(JobResponse {
        job: info.clone(),
        response,
    })
    .unwrap_or(Value::Null)
}

#[async_trait]
impl Transport for OfflineResource {
    fn name(&self) -> &str {
        &self.resource_id
    }

    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    async fn send(&self, request: Request) -> TransportResult<Response> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        let injected = self
            .pending_failures
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front();
        if let Some(error) = injected {
            debug!("Injected failure: {}", error);
            return Err(error);
        }

        let segments: Vec<&str> = request.path.trim_matches('/').split('/').collect();
        let response = match (request.method, segments.as_slice()) {
            (Method::Post, ["submit", workspace, resource]) => {
                self.submit(workspace, resource, request.body.as_ref())
            }
            (Method::Get, ["result", job_id]) => self.result(job_id),
            (Method::Delete, ["jobs", job_id]) => self.cancel(job_id),
            _ => Response::new(404, json!({ "detail": "Not Found" })),
        };
        Ok(response)
    }
}
