//! Remote Git LFS storage for git-as-svn.
//!
//! Large objects live on a remote LFS service and are addressed by their
//! SHA-256 content hash. This crate bridges such hashes to the LFS batch
//! protocol (negotiate, then transfer) and to the LFS locking API.
//!
//! # Layers
//!
//! - [`LfsClient`] -- one principal's view of the remote service (wire level)
//! - [`ClientFactory`] -- hands out per-principal clients
//! - [`HttpLfsClient`] / [`HttpClientFactory`] -- reqwest-based transport
//! - [`InMemoryLfsServer`] -- in-process service for tests and embedding
//! - [`RemoteStorage`] -- batch negotiation, transfers and lock coordination
//!   on top of a factory; implements [`LfsStorage`]
//!
//! Object identifiers handed to this crate from the outside carry the
//! [`OID_PREFIX`] (`sha256:`); everything after it is the content hash.

pub mod config;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod locks;
pub mod memory;
pub mod pointer;
pub mod reader;
pub mod spill;
pub mod storage;
pub mod transport;
pub mod types;
pub mod writer;

pub use config::{AuthMethod, LfsConfig};
pub use error::{LfsError, LfsResult};
pub use http::{HttpClientFactory, HttpLfsClient};
pub use locks::LockCoordinator;
pub use memory::{InMemoryClientFactory, InMemoryLfsClient, InMemoryLfsServer};
pub use pointer::{Pointer, MAX_POINTER_SIZE, OID_PREFIX};
pub use reader::{LfsReader, RemoteReader};
pub use spill::{SpillBuffer, SpilledContent};
pub use storage::{LfsStorage, RemoteStorage};
pub use transport::{ClientFactory, LfsClient, StreamProvider};
pub use types::{
    BatchItem, BatchReq, BatchRes, ItemError, Link, Links, Lock, LockOwner, Meta, ObjectRes,
    Operation, Ref, VerifyLocksRes,
};
pub use writer::{LfsWriter, RemoteWriter};
