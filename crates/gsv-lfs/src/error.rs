use thiserror::Error;

use crate::types::{Lock, Operation};

/// Errors from remote LFS storage operations.
#[derive(Debug, Error)]
pub enum LfsError {
    /// Transport-level failure talking to the LFS service.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },

    /// The LFS service answered with an unexpected status.
    #[error("LFS server {endpoint} returned {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("failed to deserialize response from {endpoint}: {reason}")]
    Deserialization { endpoint: String, reason: String },

    #[error("empty batch response while {operation}ing {oid}")]
    EmptyBatch { operation: Operation, oid: String },

    /// A batch item carried a protocol-level error.
    #[error("LFS error[{code}] for {oid}: {message}")]
    Item {
        oid: String,
        code: i32,
        message: String,
    },

    /// A batch item lacks the transfer link the operation needs.
    #[error("batch response carries no {0} link")]
    MissingLink(&'static str),

    /// The transfer service refused the uploaded bytes.
    #[error("failed to upload LFS object {oid}: {reason}")]
    UploadRejected { oid: String, reason: String },

    /// Another principal holds a lock on the requested path.
    #[error("lock conflict on {}: {message}", lock.path)]
    LockConflict { lock: Lock, message: String },

    #[error("malformed LFS pointer: {0}")]
    MalformedPointer(String),

    #[error("invalid LFS oid: {0}")]
    InvalidOid(String),

    /// The writer was used after it had been finished.
    #[error("LFS writer already finished")]
    WriterFinished,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LfsError {
    /// The conflicting lock, if this is a lock conflict.
    pub fn conflicting_lock(&self) -> Option<&Lock> {
        match self {
            Self::LockConflict { lock, .. } => Some(lock),
            _ => None,
        }
    }
}

/// Result alias for LFS operations.
pub type LfsResult<T> = Result<T, LfsError>;
