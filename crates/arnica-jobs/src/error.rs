//! Error handling for the job lifecycle engine.

use std::time::Duration;

use arnica_hal::TransportError;
use arnica_ir::ValidationError;
use thiserror::Error;

/// Result type for job lifecycle operations.
pub type JobsResult<T> = Result<T, JobsError>;

/// Errors surfaced by the job lifecycle engine.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum JobsError {
    /// The batch was rejected locally, before any network call.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The resource exists but does not accept jobs right now.
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// The workspace or resource does not exist.
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// The access token was refused.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The resource refused the submission for another reason.
    #[error("Submission rejected (HTTP {status}): {message}")]
    SubmissionRejected {
        /// HTTP status.
        status: u16,
        /// Resource detail.
        message: String,
    },

    /// The submission exchange did not complete.
    #[error("Submission failed: {0}")]
    SubmissionTransport(TransportError),

    /// Result queries kept failing after the retry budget was spent.
    #[error("Polling failed after {attempts} attempts: {last_error}")]
    PollingFailed {
        /// Exchanges attempted.
        attempts: u32,
        /// Last failure.
        last_error: String,
    },

    /// The resource reported a job failure.
    #[error("Job {job_id} failed: {message}")]
    JobFailed {
        /// Failed job.
        job_id: String,
        /// Resource message, verbatim.
        message: String,
    },

    /// The job was cancelled.
    #[error("Job {0} was cancelled")]
    JobCancelled(String),

    /// The resource does not know the job.
    #[error("Job {0} not found on the resource")]
    JobNotFound(String),

    /// The local wait expired; the job is still live on the resource.
    #[error("Timed out after {elapsed:?} waiting for job {job_id}")]
    Timeout {
        /// Job waited on.
        job_id: String,
        /// Time spent waiting.
        elapsed: Duration,
    },

    /// A second cancellation of the same job.
    #[error("Job {0} is already cancelled")]
    AlreadyCancelled(String),

    /// The resource refused the cancellation.
    #[error("Cancellation of job {job_id} forbidden: {message}")]
    CancellationForbidden {
        /// Job.
        job_id: String,
        /// Resource detail.
        message: String,
    },

    /// Results were assembled before every circuit reached a terminal state.
    #[error("Incomplete batch: {pending} of {total} circuits have no result")]
    IncompleteBatch {
        /// Circuits without a result.
        pending: usize,
        /// Circuits in the batch.
        total: usize,
    },

    /// No persisted handle under this id.
    #[error("No persisted job handle for {0}")]
    HandleNotFound(String),

    /// The resource answered something this client cannot interpret.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl JobsError {
    /// Whether the failure may go away by retrying the same call later.
    pub fn is_retryable(&self) -> bool {
        match self {
            JobsError::SubmissionTransport(e) => e.is_transient(),
            JobsError::PollingFailed { .. } | JobsError::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Whether the job reached a terminal state on the resource.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobsError::JobFailed { .. } | JobsError::JobCancelled(_) | JobsError::JobNotFound(_)
        )
    }
}
