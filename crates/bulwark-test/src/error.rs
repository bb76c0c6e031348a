//! Test error types.

use thiserror::Error;

/// Errors that can occur during testing.
#[derive(Debug, Error)]
pub enum TestError {
    /// Request building failed
    #[error("Request build error: {0}")]
    RequestBuild(String),

    /// Response body reading failed
    #[error("Body read error: {0}")]
    BodyRead(String),

    /// Header name or value is invalid
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}
