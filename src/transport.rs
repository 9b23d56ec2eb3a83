//! HTTP access to the backend.
//!
//! Every failure (network, non-2xx status, malformed body) collapses into one
//! [`TransportError`] that keeps the underlying cause for logging. Callers log
//! it and carry on with their previous state.

use std::fmt;

use futures::future::LocalBoxFuture;
use serde::de::DeserializeOwned;

/// The only verbs the backend speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requests against a fixed base URL. Paths are relative to that base.
///
/// Futures are `'static` so they can be spawned and aborted independently of
/// the adapter that created them.
pub trait Transport {
    fn fetch_json(
        &self,
        path: &str,
        method: Method,
    ) -> LocalBoxFuture<'static, Result<serde_json::Value, TransportError>>;

    fn fetch_binary(&self, path: &str) -> LocalBoxFuture<'static, Result<Vec<u8>, TransportError>>;

    /// Fire a command whose response body is ignored; only the status matters.
    fn send(
        &self,
        path: &str,
        method: Method,
    ) -> LocalBoxFuture<'static, Result<(), TransportError>>;
}

/// Underlying reason a request did not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCause {
    Network(String),
    Status(u16),
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub endpoint: String,
    pub cause: TransportCause,
}

impl TransportError {
    pub fn network(endpoint: &str, msg: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            cause: TransportCause::Network(msg.into()),
        }
    }

    pub fn status(endpoint: &str, status: u16) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            cause: TransportCause::Status(status),
        }
    }

    pub fn decode(endpoint: &str, msg: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            cause: TransportCause::Decode(msg.into()),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            TransportCause::Network(msg) => write!(f, "{}: network error: {}", self.endpoint, msg),
            TransportCause::Status(code) => write!(f, "{}: HTTP status {}", self.endpoint, code),
            TransportCause::Decode(msg) => write!(f, "{}: malformed body: {}", self.endpoint, msg),
        }
    }
}

impl std::error::Error for TransportError {}

/// Interprets a JSON body as `T`, reporting mismatches as decode failures.
pub fn decode_json<T: DeserializeOwned>(
    endpoint: &str,
    value: serde_json::Value,
) -> Result<T, TransportError> {
    serde_json::from_value(value).map_err(|e| TransportError::decode(endpoint, e.to_string()))
}

/// Joins a base URL and a relative path without doubling or dropping the slash.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
