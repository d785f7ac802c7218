use async_trait::async_trait;
use gsv_store::ObjectStream;

use crate::error::LfsResult;
use crate::pointer::OID_PREFIX;
use crate::storage::RemoteStorage;
use crate::types::{Links, Meta};

/// Read handle for one large object.
#[async_trait]
pub trait LfsReader: Send + Sync {
    /// Identifier with the `sha256:` prefix.
    fn oid(&self) -> String;

    /// Bare SHA-256 hex hash.
    fn hash(&self) -> &str;

    fn size(&self) -> u64;

    /// MD5 of the content, when the backend already knows it.
    fn md5(&self) -> Option<&str>;

    /// Open a fresh stream over the content.
    async fn open_stream(&self) -> LfsResult<ObjectStream>;
}

/// Reader over an object negotiated through a download batch.
///
/// Holds the transfer links from the batch response; they are not reused
/// once the reader is dropped.
pub struct RemoteReader {
    storage: RemoteStorage,
    meta: Meta,
    links: Links,
}

impl RemoteReader {
    pub(crate) fn new(storage: RemoteStorage, meta: Meta, links: Links) -> Self {
        Self {
            storage,
            meta,
            links,
        }
    }
}

#[async_trait]
impl LfsReader for RemoteReader {
    fn oid(&self) -> String {
        format!("{OID_PREFIX}{}", self.meta.oid)
    }

    fn hash(&self) -> &str {
        &self.meta.oid
    }

    fn size(&self) -> u64 {
        self.meta.size
    }

    fn md5(&self) -> Option<&str> {
        None
    }

    async fn open_stream(&self) -> LfsResult<ObjectStream> {
        self.storage.get_object(&self.links).await
    }
}
