//! Classified failures from the remote API.
//!
//! Transport errors and non-2xx responses are normalized into an [`ApiError`]
//! that keeps the HTTP status when one is known, then surface as
//! [`BridgeError::Api`].

use std::fmt;

use reqwest::StatusCode;

use crate::error::BridgeError;

use super::HttpMethod;

#[derive(Debug)]
pub struct ApiError {
    /// HTTP status code, if available
    pub status: Option<StatusCode>,
    /// Human-readable error message
    pub message: String,
}

impl ApiError {
    pub fn with_status(message: impl Into<String>, status: StatusCode) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// A response that came back with a non-success status.
    pub fn unsuccessful(method: HttpMethod, url: &str, status: StatusCode) -> Self {
        Self::with_status(format!("{method} {url} unsuccessful"), status)
    }

    /// A request that never produced a response (connect, timeout, TLS...).
    pub fn transport(method: HttpMethod, url: &str, error: &reqwest::Error) -> Self {
        Self {
            status: error.status(),
            message: format!("{method} {url} failed: {error}"),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<ApiError> for BridgeError {
    fn from(error: ApiError) -> Self {
        BridgeError::Api {
            status: error.status,
            message: error.message,
        }
    }
}
