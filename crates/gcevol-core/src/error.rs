//! Error taxonomy for volume operations
//!
//! Three families of failure reach the response boundary: configuration
//! errors (detected before any side effect), provider errors and filesystem
//! errors. [`Error`] wraps them transparently so the text a caller sees is
//! exactly the underlying description.

use std::num::ParseIntError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for volume operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for a volume operation
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Filesystem(#[from] FsError),
}

/// Invalid request options or disk configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown option {0:?}")]
    UnknownOption(String),

    #[error("invalid SizeGb {value:?}: {source}")]
    InvalidSize {
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("SizeGb must not be negative, got {0}")]
    NegativeSize(i64),

    #[error("SizeGb {size} exceeds the maximum of {max}")]
    SizeTooLarge { size: i64, max: i64 },

    #[error("disk name is required")]
    EmptyName,

    #[error("invalid disk name {0:?}: must start with a lowercase letter, contain only lowercase letters, digits and hyphens, not end with a hyphen, and be at most 63 characters")]
    InvalidName(String),

    #[error("SourceSnapshot and SourceImage are mutually exclusive")]
    ConflictingSources,
}

/// Failure reported by the remote disk provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Error returned by the remote API, surfaced verbatim
    #[error("{0}")]
    Remote(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out after {waited:?} waiting for {operation}")]
    Timeout { operation: String, waited: Duration },

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("operation {operation} failed: {message}")]
    Operation { operation: String, message: String },
}

impl ProviderError {
    /// Create a remote error
    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}

/// Failure reported by the local filesystem
#[derive(Debug, Error)]
pub enum FsError {
    #[error("no such file or directory: {0:?}")]
    NotFound(PathBuf),

    #[error("error the mountpoint {0:?} already exists")]
    NotADirectory(PathBuf),

    #[error("{op} {path:?}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {status}: {stderr}")]
    Command {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl FsError {
    /// Wrap an I/O error, mapping `NotFound` onto [`FsError::NotFound`]
    pub fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path)
        } else {
            Self::Io { op, path, source }
        }
    }

    /// Check if the path did not exist
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
