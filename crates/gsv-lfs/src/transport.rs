use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use gsv_store::ObjectStream;
use gsv_types::Principal;

use crate::error::LfsResult;
use crate::types::{BatchReq, BatchRes, Links, Lock, Meta, ObjectRes, Ref, VerifyLocksRes};

/// Source of an upload body. May be opened more than once (e.g. on retry).
#[async_trait]
pub trait StreamProvider: Send + Sync {
    async fn open_stream(&self) -> io::Result<ObjectStream>;
}

/// One principal's connection to a remote LFS service.
///
/// Object identifiers at this level are bare SHA-256 hex hashes.
#[async_trait]
pub trait LfsClient: Send + Sync {
    /// Metadata of a stored object, `None` if the server does not have it.
    async fn get_meta(&self, hash: &str) -> LfsResult<Option<ObjectRes>>;

    async fn post_batch(&self, req: &BatchReq) -> LfsResult<BatchRes>;

    /// Upload through the links of an `upload` batch item.
    ///
    /// Returns `false` when there was nothing to transfer because the server
    /// already has the object.
    async fn put_object(
        &self,
        provider: &dyn StreamProvider,
        meta: &Meta,
        links: &Links,
    ) -> LfsResult<bool>;

    /// Download through the `download` link.
    async fn get_object(&self, links: &Links) -> LfsResult<ObjectStream>;

    /// Create a lock. Fails with `LfsError::LockConflict` when someone else
    /// holds one on `path`.
    async fn lock(&self, path: &str, reference: Option<&Ref>) -> LfsResult<Lock>;

    /// Delete a lock by id. `None` when no such lock exists.
    async fn unlock(&self, id: &str, force: bool, reference: Option<&Ref>)
        -> LfsResult<Option<Lock>>;

    async fn list_locks(
        &self,
        path: Option<&str>,
        id: Option<&str>,
        reference: Option<&Ref>,
    ) -> LfsResult<Vec<Lock>>;

    async fn verify_locks(&self, reference: Option<&Ref>) -> LfsResult<VerifyLocksRes>;
}

/// Hands out clients authenticated as a given principal.
pub trait ClientFactory: Send + Sync {
    fn client(&self, principal: &Principal) -> LfsResult<Arc<dyn LfsClient>>;

    /// Drop whatever is cached for `principal`; the next `client` call builds
    /// a fresh one.
    fn invalidate(&self, principal: &Principal);
}
