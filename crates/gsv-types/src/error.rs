use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid object hash length: {0} bytes (expected 20 or 32)")]
    InvalidHashLength(usize),

    #[error("invalid branch name: {name}: {reason}")]
    InvalidBranchName { name: String, reason: String },
}
