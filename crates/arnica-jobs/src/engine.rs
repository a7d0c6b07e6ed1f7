//! The job lifecycle engine.
//!
//! [`JobEngine`] drives a batch through submission, polling and result
//! assembly over any [`Transport`], and checkpoints handles in a
//! [`HandleStore`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use arnica_hal::wire::{
    JobResponse, JobSubmission, ResultResponse, StatusPayload, cancel_path, result_path,
    submit_path,
};
use arnica_hal::{
    AssembledResult, Batch, JobHandle, JobId, JobState, Progress, RawResult, Request,
    ResourceIdentity, ResourceType, Response, Transport, TransportError,
};
use arnica_ir::CircuitSpec;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::assembler::{assemble, outcomes_from_state};
use crate::backoff::{Backoff, RetryPolicy};
use crate::config::EngineConfig;
use crate::encoder::{Limits, encode_batch};
use crate::error::{JobsError, JobsResult};
use crate::persistence::{CredentialsRef, HandleStore, JsonStore, MemoryStore, PersistedRecord};
use crate::progress::{NoProgress, ProgressReporter};

/// How long and how often [`JobEngine::wait`] queries a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Local wait budget; `None` waits until a terminal state.
    pub timeout: Option<Duration>,
    /// Pause between two queries.
    pub poll_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl WaitOptions {
    /// Wait at most `timeout`, querying every `poll_interval`.
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            poll_interval,
        }
    }

    /// Wait without a local timeout.
    pub fn unbounded(poll_interval: Duration) -> Self {
        Self {
            timeout: None,
            poll_interval,
        }
    }
}

/// HTTP statuses that are retried while talking to a submitted job.
fn is_transient_status(status: u16) -> bool {
    matches!(status, 429 | 502 | 503 | 504)
}

/// Submits, polls, cancels and persists jobs over a transport.
pub struct JobEngine<T: Transport> {
    transport: T,
    limits: Limits,
    retry: RetryPolicy,
    wait_options: WaitOptions,
    store: Arc<dyn HandleStore>,
    credentials: CredentialsRef,
}

impl<T: Transport> std::fmt::Debug for JobEngine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobEngine")
            .field("transport", &self.transport.name())
            .field("limits", &self.limits)
            .field("retry", &self.retry)
            .field("wait_options", &self.wait_options)
            .field("credentials", &self.credentials)
            .finish()
    }
}

impl<T: Transport> JobEngine<T> {
    /// An engine with default limits and an in-memory handle store.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            limits: Limits::default(),
            retry: RetryPolicy::default(),
            wait_options: WaitOptions::default(),
            store: Arc::new(MemoryStore::new()),
            credentials: CredentialsRef::default(),
        }
    }

    /// An engine configured from `config`, persisting to a JSON store.
    pub async fn from_config(transport: T, config: &EngineConfig) -> JobsResult<Self> {
        config.validate()?;
        let store = JsonStore::new(config.store.resolved_path()?).await?;
        Ok(Self::new(transport)
            .with_limits(config.limits)
            .with_retry_policy(config.polling.retry_policy())
            .with_wait_options(config.polling.wait_options())
            .with_credentials(config.portal.credentials())
            .with_store(Arc::new(store)))
    }

    /// Set the limits enforced before submission.
    #[must_use]
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the retry policy of exchanges with submitted jobs.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the default wait options returned by [`JobEngine::wait_options`].
    #[must_use]
    pub fn with_wait_options(mut self, wait_options: WaitOptions) -> Self {
        self.wait_options = wait_options;
        self
    }

    /// Set the handle store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn HandleStore>) -> Self {
        self.store = store;
        self
    }

    /// Set the credentials reference written into persisted records.
    #[must_use]
    pub fn with_credentials(mut self, credentials: CredentialsRef) -> Self {
        self.credentials = credentials;
        self
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Limits enforced before submission.
    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Configured default wait options.
    pub fn wait_options(&self) -> WaitOptions {
        self.wait_options
    }

    /// The handle store.
    pub fn store(&self) -> &Arc<dyn HandleStore> {
        &self.store
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Submit `circuits` with `shots` repetitions each.
    ///
    /// Returns as soon as the resource has queued the batch.
    pub async fn submit(
        &self,
        circuits: Vec<CircuitSpec>,
        shots: u32,
        resource: &ResourceIdentity,
    ) -> JobsResult<JobHandle> {
        self.submit_batch(Batch::new(circuits, shots), resource, None)
            .await
    }

    /// Submit a batch, optionally with a label (default `arnica-<uuid>`).
    ///
    /// Limits are checked locally first; nothing is sent for an invalid batch.
    #[instrument(skip(self, batch, label), fields(resource = %resource, circuits = batch.len(), shots = batch.shots))]
    pub async fn submit_batch(
        &self,
        batch: Batch,
        resource: &ResourceIdentity,
        label: Option<String>,
    ) -> JobsResult<JobHandle> {
        let circuits = encode_batch(&batch, &self.limits, resource)?;
        let label = label.unwrap_or_else(|| format!("arnica-{}", uuid::Uuid::new_v4()));
        let body = serde_json::to_value(JobSubmission::new(circuits, Some(label)))?;
        let request = Request::post(
            submit_path(&resource.workspace_id, &resource.resource_id),
            body,
        );

        debug!(path = %request.path, "Submitting batch");
        let response = self
            .transport
            .send(request)
            .await
            .map_err(JobsError::SubmissionTransport)?;

        if !response.is_success() {
            return Err(submission_error(resource, &response));
        }

        let submitted: JobResponse = response
            .json()
            .map_err(|e| JobsError::Protocol(format!("undecodable submission response: {e}")))?;
        if !matches!(submitted.response, StatusPayload::Queued) {
            debug!(status = ?submitted.response, "Job not reported as queued at submission");
        }

        let handle = JobHandle::new(JobId::new(submitted.job.job_id), resource.clone(), batch);
        info!(job_id = %handle.job_id(), "Submitted job");
        Ok(handle)
    }

    // -----------------------------------------------------------------------
    // Polling
    // -----------------------------------------------------------------------

    /// Query the job state once.
    ///
    /// Read-only against the resource: calling it again without a change on
    /// the resource side yields the same state. Transient failures are retried
    /// under the engine's retry policy. An id the resource no longer knows is
    /// reported as [`JobState::Unknown`], not as an error.
    #[instrument(skip(self, handle), fields(job_id = %handle.job_id()))]
    pub async fn poll_once(&self, handle: &JobHandle) -> JobsResult<JobState> {
        let mut backoff = Backoff::new(self.retry);
        self.query_state(handle, &mut backoff).await
    }

    /// Query the job once and report its progress.
    pub async fn progress(&self, handle: &JobHandle) -> JobsResult<Progress> {
        let state = self.poll_once(handle).await?;
        Ok(Progress::from_state(&state, handle.circuit_count()))
    }

    /// Poll until the job reaches a terminal state, then assemble its results.
    ///
    /// Queries happen at `0, P, 2P, …` and stop once `timeout` has elapsed, so
    /// at most `ceil(timeout / P) + 1` queries are issued. A timeout only ends
    /// the local wait; the job stays live on the resource.
    pub async fn wait(&self, handle: &JobHandle, options: WaitOptions) -> JobsResult<AssembledResult> {
        self.wait_with_progress(handle, options, &NoProgress).await
    }

    /// [`JobEngine::wait`] reporting progress to `reporter`.
    #[instrument(skip(self, handle, reporter), fields(job_id = %handle.job_id()))]
    pub async fn wait_with_progress(
        &self,
        handle: &JobHandle,
        options: WaitOptions,
        reporter: &dyn ProgressReporter,
    ) -> JobsResult<AssembledResult> {
        reporter.start(handle.job_id(), handle.circuit_count());
        let result = self.wait_loop(handle, options, reporter).await;
        reporter.finish();
        result
    }

    /// Wait on several independent jobs concurrently.
    ///
    /// Outcomes are returned in the order of `handles`.
    pub async fn wait_all(
        &self,
        handles: &[JobHandle],
        options: WaitOptions,
    ) -> Vec<JobsResult<AssembledResult>> {
        futures::future::join_all(handles.iter().map(|h| self.wait(h, options))).await
    }

    async fn wait_loop(
        &self,
        handle: &JobHandle,
        options: WaitOptions,
        reporter: &dyn ProgressReporter,
    ) -> JobsResult<AssembledResult> {
        let start = Instant::now();
        let total = handle.circuit_count();
        let mut backoff = Backoff::new(self.retry);
        let mut seen = 0usize;

        loop {
            let mut state = self.query_state(handle, &mut backoff).await?;

            if let JobState::Ongoing { finished_count } = &mut state {
                if *finished_count < seen {
                    warn!(
                        reported = *finished_count,
                        seen, "Finished count went backwards; keeping the larger value"
                    );
                    *finished_count = seen;
                }
                seen = *finished_count;
            }
            reporter.update(Progress::from_state(&state, total));

            match state {
                JobState::Queued | JobState::Ongoing { .. } => {}
                JobState::Finished { ref results } => {
                    let missing = (0..total).filter(|i| !results.contains_key(i)).count();
                    if missing > 0 {
                        return Err(JobsError::Protocol(format!(
                            "job reported finished with {missing} of {total} circuit results missing"
                        )));
                    }
                    info!("Job finished");
                    return self.assemble(handle, &state);
                }
                JobState::Error { message } => {
                    warn!(%message, "Job failed");
                    return Err(JobsError::JobFailed {
                        job_id: handle.job_id().to_string(),
                        message,
                    });
                }
                JobState::Cancelled => {
                    info!("Job was cancelled");
                    return Err(JobsError::JobCancelled(handle.job_id().to_string()));
                }
                JobState::Unknown => {
                    warn!("Job unknown to the resource");
                    return Err(JobsError::JobNotFound(handle.job_id().to_string()));
                }
            }

            let elapsed = start.elapsed();
            if options.timeout.is_some_and(|timeout| elapsed >= timeout) {
                info!(?elapsed, "Local wait timed out; job left running");
                return Err(JobsError::Timeout {
                    job_id: handle.job_id().to_string(),
                    elapsed,
                });
            }

            tokio::time::sleep(options.poll_interval).await;
        }
    }

    /// Assemble the results of a polled state.
    ///
    /// `Finished` gives the per-circuit results; `Error` gives a result with
    /// every circuit failed; pending states fail with
    /// [`JobsError::IncompleteBatch`].
    pub fn assemble(&self, handle: &JobHandle, state: &JobState) -> JobsResult<AssembledResult> {
        match state {
            JobState::Cancelled => Err(JobsError::JobCancelled(handle.job_id().to_string())),
            JobState::Unknown => Err(JobsError::JobNotFound(handle.job_id().to_string())),
            _ => {
                let outcomes = outcomes_from_state(state, handle.circuit_count())?;
                let batch = handle.batch();
                assemble(handle.job_id(), &batch.circuits, &outcomes, batch.memory)
            }
        }
    }

    async fn query_state(&self, handle: &JobHandle, backoff: &mut Backoff) -> JobsResult<JobState> {
        let request = Request::get(result_path(handle.job_id().as_str()));
        let response = self.exchange(request, backoff).await?;
        let state = decode_state(handle, &response)?;
        debug!(state = %state, "Polled job");
        Ok(state)
    }

    /// Send `request`, retrying transient failures under `backoff`.
    async fn exchange(&self, request: Request, backoff: &mut Backoff) -> JobsResult<Response> {
        loop {
            let failure = match self.transport.send(request.clone()).await {
                Ok(response) if is_transient_status(response.status) => {
                    format!("HTTP {}: {}", response.status, response.detail())
                }
                Ok(response) => {
                    backoff.reset();
                    return Ok(response);
                }
                Err(e) if e.is_transient() => e.to_string(),
                Err(TransportError::Decode(message)) => {
                    return Err(JobsError::Protocol(format!(
                        "undecodable response to {} {}: {message}",
                        request.method, request.path
                    )));
                }
                Err(e) => {
                    return Err(JobsError::PollingFailed {
                        attempts: backoff.failures() + 1,
                        last_error: e.to_string(),
                    });
                }
            };

            match backoff.next_delay() {
                Some(delay) => {
                    warn!(
                        method = %request.method,
                        path = %request.path,
                        attempt = backoff.failures(),
                        ?delay,
                        "Transient failure, retrying: {}",
                        failure
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    return Err(JobsError::PollingFailed {
                        attempts: backoff.failures(),
                        last_error: failure,
                    });
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Cancellation
    // -----------------------------------------------------------------------

    /// Ask the resource to cancel the job.
    ///
    /// Circuits that already started run to completion; only circuits not yet
    /// started are prevented from starting.
    #[instrument(skip(self, handle), fields(job_id = %handle.job_id()))]
    pub async fn cancel(&self, handle: &JobHandle) -> JobsResult<()> {
        let job_id = handle.job_id().to_string();
        let mut backoff = Backoff::new(self.retry);
        let response = self
            .exchange(Request::delete(cancel_path(&job_id)), &mut backoff)
            .await?;

        match response.status {
            208 => Err(JobsError::AlreadyCancelled(job_id)),
            200 | 204 => {
                info!("Cancelled job");
                Ok(())
            }
            403 | 409 => Err(JobsError::CancellationForbidden {
                job_id,
                message: response.detail(),
            }),
            404 | 410 => Err(JobsError::JobNotFound(job_id)),
            401 => Err(JobsError::Unauthorized(response.detail())),
            status => Err(JobsError::Protocol(format!(
                "unexpected HTTP {status} on cancellation: {}",
                response.detail()
            ))),
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Checkpoint `handle` in the store; overwrites an earlier checkpoint.
    #[instrument(skip(self, handle), fields(job_id = %handle.job_id()))]
    pub async fn persist(&self, handle: &JobHandle) -> JobsResult<()> {
        let record = PersistedRecord::new(handle.clone(), self.credentials.clone());
        self.store.save(&record).await
    }

    /// Rebuild a handle from the store without contacting the resource.
    ///
    /// With `remove_on_success`, the record is consumed and a second restore
    /// fails with [`JobsError::HandleNotFound`].
    #[instrument(skip(self))]
    pub async fn restore(&self, job_id: &JobId, remove_on_success: bool) -> JobsResult<JobHandle> {
        let record = self.store.restore(job_id, remove_on_success).await?;
        if record.credentials != self.credentials {
            warn!(
                stored = %record.credentials.token_env,
                current = %self.credentials.token_env,
                "Restored job was submitted with other credentials"
            );
        }
        Ok(record.handle)
    }

    /// Make a restored handle pollable again.
    ///
    /// Jobs of an in-process simulator do not survive the process that ran
    /// them, so their batch is submitted again and the new handle returned.
    /// Other handles are returned unchanged.
    pub async fn reattach(&self, handle: JobHandle) -> JobsResult<JobHandle> {
        if handle.resource().resource_type != ResourceType::OfflineSimulator {
            return Ok(handle);
        }
        info!(job_id = %handle.job_id(), resource = %handle.resource(), "Re-submitting offline simulator job");
        self.submit_batch(handle.batch().clone(), handle.resource(), None)
            .await
    }
}

fn submission_error(resource: &ResourceIdentity, response: &Response) -> JobsError {
    let detail = response.detail();
    match response.status {
        401 | 403 => JobsError::Unauthorized(detail),
        404 => JobsError::ResourceNotFound(format!("{resource}: {detail}")),
        423 | 503 => JobsError::ResourceUnavailable(format!("{resource}: {detail}")),
        status => JobsError::SubmissionRejected {
            status,
            message: detail,
        },
    }
}

fn decode_state(handle: &JobHandle, response: &Response) -> JobsResult<JobState> {
    match response.status {
        404 | 410 => return Ok(JobState::Unknown),
        401 | 403 => return Err(JobsError::Unauthorized(response.detail())),
        status if !response.is_success() => {
            return Err(JobsError::PollingFailed {
                attempts: 1,
                last_error: format!("HTTP {status}: {}", response.detail()),
            });
        }
        _ => {}
    }

    let body: ResultResponse = response
        .json()
        .map_err(|e| JobsError::Protocol(format!("undecodable result response: {e}")))?;

    let job = match body {
        ResultResponse::UnknownJob(unknown) => {
            debug!(job_id = %unknown.job_id, message = %unknown.message, "Resource reports unknown job");
            return Ok(JobState::Unknown);
        }
        ResultResponse::Job(job) => job,
    };

    if !job.job.job_id.eq_ignore_ascii_case(handle.job_id().as_str()) {
        return Err(JobsError::Protocol(format!(
            "result for job {} while querying {}",
            job.job.job_id,
            handle.job_id()
        )));
    }

    Ok(match job.response {
        StatusPayload::Queued => JobState::Queued,
        StatusPayload::Ongoing { finished_count } => JobState::Ongoing { finished_count },
        StatusPayload::Finished { result } => {
            let mut results = BTreeMap::new();
            for (key, samples) in result {
                let index: usize = key.parse().map_err(|_| {
                    JobsError::Protocol(format!("invalid circuit index '{key}' in result"))
                })?;
                results.insert(index, RawResult::new(samples));
            }
            JobState::Finished { results }
        }
        StatusPayload::Error { message } => JobState::Error { message },
        StatusPayload::Cancelled => JobState::Cancelled,
        StatusPayload::Unrecognized => {
            return Err(JobsError::Protocol(format!(
                "unrecognized job status {}",
                response.body["response"]["status"]
            )));
        }
    })
}
