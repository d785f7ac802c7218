//! Foundation types for the git-as-svn storage core.
//!
//! Every other `gsv-*` crate depends on `gsv-types`.
//!
//! # Key Types
//!
//! - [`ObjectHash`]: Content-addressed identity of a repository object
//! - [`Principal`]: Opaque caller identity used to pick remote credentials
//! - [`BranchRef`]: Validated short branch name scoping lock operations
//! - [`LockDesc`]: Local descriptor of a path lock held on the remote
//! - [`LockTarget`] / [`UnlockTarget`]: Batch lock/unlock request items

pub mod branch;
pub mod error;
pub mod lock;
pub mod object;
pub mod principal;

pub use branch::{validate_branch_name, BranchRef};
pub use error::TypeError;
pub use lock::{LockDesc, LockTarget, UnlockTarget, VerifyLocksResult};
pub use object::ObjectHash;
pub use principal::Principal;
