//! Error types for the HTTP helper

use thiserror::Error;

/// Errors that can occur when sending a request
///
/// Non-2xx responses are not errors; they come back as a [`crate::WebResponse`].
#[derive(Error, Debug)]
pub enum HttpError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Header name or value rejected
    #[error("Invalid header {name}: {reason}")]
    Header {
        /// Header name as supplied
        name: String,
        /// Why it was rejected
        reason: String,
    },
}

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, HttpError>;
