//! Inference capability: image bytes + instruction text → response text.
//!
//! The pipeline only sees the [`InferenceClient`] trait. Two HTTP backends
//! are provided (local Ollama, hosted Gemini) plus a scripted mock for tests.
//! Transport and auth failures surface as [`InferenceError`]; a successful
//! call always returns the model's raw text, parseable or not.

pub mod types;
pub mod ollama;
pub mod gemini;
pub mod mock;

pub use types::*;
pub use ollama::OllamaClient;
pub use gemini::GeminiClient;
pub use mock::{MockInferenceClient, RecordedCall};

use thiserror::Error;

/// Stands in for an error body that could not be read.
const UNREADABLE_BODY: &str = "<unreadable response body>";

#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("Inference service is not reachable at {0}")]
    Connection(String),

    #[error("Inference request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Inference service rejected credentials (status {status}): {body}")]
    Auth { status: u16, body: String },

    #[error("Inference service returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("Malformed inference response envelope: {0}")]
    Envelope(String),
}

impl InferenceError {
    /// Connection drops, timeouts and 5xx responses may succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            Self::Auth { .. } | Self::Http(_) | Self::Envelope(_) => false,
        }
    }

    /// Map a reqwest transport error onto the taxonomy.
    pub(crate) fn from_transport(e: reqwest::Error, endpoint: &str, timeout_secs: u64) -> Self {
        if e.is_timeout() {
            Self::Timeout { secs: timeout_secs }
        } else if e.is_connect() {
            Self::Connection(endpoint.to_string())
        } else {
            Self::Http(e.to_string())
        }
    }

    /// Map a non-success HTTP status onto the taxonomy.
    pub(crate) fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Auth { status, body },
            _ => Self::Status { status, body },
        }
    }

    /// Map a non-success response, keeping its body for the caller.
    pub(crate) fn from_response(response: reqwest::blocking::Response) -> Self {
        let status = response.status().as_u16();
        let body = match response.text() {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(status, error = %e, "Could not read error response body");
                UNREADABLE_BODY.to_string()
            }
        };
        Self::from_status(status, body)
    }

    /// Credentials rejected before any request was sent.
    pub(crate) fn missing_credentials(detail: &str) -> Self {
        Self::Auth {
            status: 401,
            body: detail.to_string(),
        }
    }
}
