//! Transport failures.

use thiserror::Error;

/// An exchange with a resource that did not complete.
///
/// Exchanges that complete with a non-2xx status are not errors at this
/// level; they come back as a [`Response`](crate::Response).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The connection could not be established or was dropped.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The exchange did not complete in time.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The response body could not be decoded as JSON.
    #[error("Undecodable response: {0}")]
    Decode(String),

    /// Any other failure below the API client.
    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::Connection(_) | TransportError::Timeout(_)
        )
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
