//! Error types for quorumkv

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Input Errors ===
    #[error("key cannot be empty")]
    EmptyKey,

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid version: {0} (versions start at 1)")]
    InvalidVersion(u64),

    // === Storage Errors ===
    #[error("Key not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    // === Quorum Errors ===
    #[error("failed to meet quorum: need {needed}, got {got}")]
    QuorumNotMet {
        needed: usize,
        got: usize,
        /// Version that was committed locally, for writes.
        version: Option<u64>,
    },

    #[error("Peer {peer} unreachable: {reason}")]
    PeerUnreachable { peer: String, reason: String },

    // === Topology Errors ===
    #[error("Forbidden: {0}")]
    Forbidden(String),

    // === Network Errors ===
    #[error("HTTP error: {0}")]
    Http(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("Operation timeout: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Is this a transient, peer-level failure?
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::PeerUnreachable { .. } | Error::Timeout(_))
    }

    /// Convert to HTTP status code
    pub fn to_http_status(&self) -> StatusCode {
        match self {
            Error::EmptyKey | Error::InvalidKey(_) | Error::InvalidVersion(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::PeerUnreachable { .. } => StatusCode::BAD_GATEWAY,
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.to_http_status();
        let body = match &self {
            Error::QuorumNotMet {
                needed,
                got,
                version: Some(version),
            } => json!({
                "error": self.to_string(),
                "needed": needed,
                "got": got,
                "version": version,
            }),
            _ => json!({ "error": self.to_string() }),
        };
        (status, axum::Json(body)).into_response()
    }
}

impl From<::config::ConfigError> for Error {
    fn from(e: ::config::ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else {
            Error::Http(e.to_string())
        }
    }
}
