//! Storage seams for the git-as-svn object layer.
//!
//! Neither the repository's raw object database nor the persistent key-value
//! engine belong to this core; this crate defines the contracts they must
//! satisfy and ships implementations for tests and standalone use.
//!
//! # Raw objects
//!
//! - [`RawObjectStore`] -- open an object's bytes, or query its size cheaply
//! - [`ObjectRef`] -- one object inside one repository, bound to its store
//! - [`InMemoryRawStore`] -- `HashMap`-based raw store with access counters
//!
//! # Metadata cache store
//!
//! - [`MetadataStore`] -- table-namespaced `get` / `put_if_absent`
//! - [`InMemoryMetadataStore`] -- process-local store for tests and embedding
//! - [`JournalMetadataStore`] -- append-only journal, replayed on open
//!
//! # Design Rules
//!
//! 1. Cache entries are never overwritten: first writer wins.
//! 2. `put_if_absent` is atomic per key; callers add no locking of their own.
//! 3. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod journal;
pub mod memory;
pub mod object;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use journal::{JournalConfig, JournalMetadataStore, SyncMode};
pub use memory::{InMemoryMetadataStore, InMemoryRawStore};
pub use object::{ObjectRef, ObjectStream};
pub use traits::{CacheValue, MetadataStore, RawObjectStore};
