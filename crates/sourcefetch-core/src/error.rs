//! Error types module
//!
//! All retrieval failures are unified under `FetchError`. Each variant belongs to
//! exactly one `ErrorKind`, which callers use to decide whether to fix their input,
//! fix the environment, retry, or simply stop.

use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::mode::Mode;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like malformed input or cancellation
    Debug,
    /// Warning level - for precondition failures the caller can correct
    Warn,
    /// Error level - for unexpected environment or transport failures
    Error,
}

/// Failure taxonomy shared by every getter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unparseable address, missing working directory, unknown getter.
    MalformedInput,
    /// Source missing or of the wrong kind, destination occupied.
    Precondition,
    /// Missing external binary, exhausted credential discovery, local I/O.
    Environment,
    /// Remote listing/fetch failures and subprocess non-zero exits.
    Transport,
    /// The cancellation token fired mid-retrieval.
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Invalid source address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Relative path {0} requires a working directory")]
    MissingPwd(String),

    #[error("No getter registered for {0}")]
    UnsupportedGetter(String),

    #[error("Getter already registered for scheme {0}")]
    DuplicateGetter(String),

    #[error("Source path error for {path}: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Source path {path} must be a {expected}")]
    SourceKind { path: PathBuf, expected: Mode },

    #[error("Destination {0} exists and is not a symlink")]
    DestinationConflict(PathBuf),

    #[error("{binary} must be available and on the PATH")]
    BinaryNotFound { binary: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Object not found: s3://{bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    #[error("Storage transport error: {0}")]
    Transport(String),

    #[error("Command `{command}` failed ({status}): {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Retrieval cancelled")]
    Cancelled,
}

/// Result type for retrieval operations
pub type FetchResult<T> = Result<T, FetchError>;

impl FetchError {
    pub fn invalid_address(address: impl Into<String>, reason: impl Into<String>) -> Self {
        FetchError::InvalidAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FetchError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::InvalidAddress { .. }
            | FetchError::MissingPwd(_)
            | FetchError::UnsupportedGetter(_)
            | FetchError::DuplicateGetter(_) => ErrorKind::MalformedInput,
            FetchError::SourceUnavailable { .. }
            | FetchError::SourceKind { .. }
            | FetchError::DestinationConflict(_) => ErrorKind::Precondition,
            FetchError::BinaryNotFound { .. } | FetchError::Io { .. } => ErrorKind::Environment,
            FetchError::ObjectNotFound { .. }
            | FetchError::Transport(_)
            | FetchError::CommandFailed { .. } => ErrorKind::Transport,
            FetchError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether the same call may succeed if simply repeated.
    ///
    /// Nothing is retried internally; this is advice for the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport | ErrorKind::Cancelled)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }

    pub fn log_level(&self) -> LogLevel {
        match self.kind() {
            ErrorKind::MalformedInput | ErrorKind::Cancelled => LogLevel::Debug,
            ErrorKind::Precondition => LogLevel::Warn,
            ErrorKind::Environment | ErrorKind::Transport => LogLevel::Error,
        }
    }
}
