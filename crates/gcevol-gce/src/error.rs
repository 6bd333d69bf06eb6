//! GCE provider error types

use gcevol_core::ProviderError;
use std::time::Duration;
use thiserror::Error;

/// Compute Engine provider error
#[derive(Debug, Error)]
pub enum GceError {
    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success reply from the Compute API
    #[error("{message}")]
    Api { status: u16, message: String },

    /// Operation finished with an error
    #[error("{0}")]
    OperationFailed(String),

    /// Operation still running when the wait expired
    #[error("timed out after {waited:?} waiting for {operation}")]
    Timeout { operation: String, waited: Duration },

    /// Metadata server failure
    #[error("metadata server error: {0}")]
    Metadata(String),

    /// Invalid provider configuration
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for GCE calls
pub type GceResult<T> = Result<T, GceError>;

impl From<GceError> for ProviderError {
    fn from(err: GceError) -> Self {
        match err {
            GceError::Http(e) => Self::transport(e.to_string()),
            GceError::Api { message, .. } | GceError::OperationFailed(message) => {
                Self::Remote(message)
            }
            GceError::Timeout { operation, waited } => Self::Timeout { operation, waited },
            GceError::Metadata(message) => Self::Auth(message),
            GceError::Config(message) => Self::Operation {
                operation: "configure".to_string(),
                message,
            },
        }
    }
}
