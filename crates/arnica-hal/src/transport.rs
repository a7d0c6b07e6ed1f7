//! Request/response primitive consumed by the job engine.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::TransportResult;

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `DELETE`
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Delete => write!(f, "DELETE"),
        }
    }
}

/// A request against the API, with a path relative to the API base.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// HTTP method.
    pub method: Method,
    /// Path relative to the API base, without leading slash.
    pub path: String,
    /// JSON body, for `POST`.
    pub body: Option<Value>,
}

impl Request {
    /// A `GET` request.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    /// A `POST` request with a JSON body.
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }

    /// A `DELETE` request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            body: None,
        }
    }
}

/// A completed exchange, whatever its status code.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    /// HTTP status code.
    pub status: u16,
    /// JSON body; `Value::Null` when the body was empty.
    pub body: Value,
}

impl Response {
    /// Create a response.
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// A response without body.
    pub fn empty(status: u16) -> Self {
        Self::new(status, Value::Null)
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.body)
    }

    /// Human-readable error detail from a `{"detail": ...}` body.
    pub fn detail(&self) -> String {
        match self.body.get("detail") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => "Unspecified error".to_string(),
            Some(other) => other.to_string(),
        }
    }
}

/// Sends requests to a resource.
///
/// Implementations return `Ok` for every exchange that completed, including
/// non-2xx statuses, and reserve `Err` for exchanges that did not complete.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name for logging.
    fn name(&self) -> &str {
        "transport"
    }

    /// Perform one exchange.
    async fn send(&self, request: Request) -> TransportResult<Response>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn send(&self, request: Request) -> TransportResult<Response> {
        (**self).send(request).await
    }
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn send(&self, request: Request) -> TransportResult<Response> {
        (**self).send(request).await
    }
}
