use gsv_lfs::LfsError;
use gsv_store::StoreError;
use gsv_types::ObjectHash;
use thiserror::Error;

/// Errors from content filtering.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("LFS error: {0}")]
    Lfs(#[from] LfsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A pointer names an object the remote storage does not have.
    #[error("LFS object {oid} referenced by {object} not found")]
    RemoteObjectMissing { oid: String, object: ObjectHash },
}

/// Result alias for filter operations.
pub type FilterResult<T> = Result<T, FilterError>;
