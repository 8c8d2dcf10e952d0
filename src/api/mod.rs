//! REST client for the review backend.

mod client;
mod types;

pub use client::{AnnotationWriter, ApiClient};
pub use types::{
    queue_params, runs_params, CreatedQueue, NewAnnotation, NewQueue, QueuePage, QueueSelection,
    RunsPage,
};

use thiserror::Error;

/// Errors from talking to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// Request never got a response.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Non-2xx response.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// 2xx response carrying an `{"error": ...}` payload.
    #[error("Server error: {0}")]
    Server(String),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}
