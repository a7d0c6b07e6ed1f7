//! Error types for the portal transport.

use thiserror::Error;

/// Result type for portal client construction.
pub type PortalResult<T> = Result<T, PortalError>;

/// Errors building a [`PortalClient`](crate::PortalClient).
#[derive(Debug, Error)]
pub enum PortalError {
    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// The configured base URL is not usable.
    #[error("Invalid portal URL '{0}'")]
    InvalidUrl(String),

    /// No token in the environment variable the configuration names.
    #[error("Missing AQT token: set the {0} environment variable")]
    MissingToken(String),
}
