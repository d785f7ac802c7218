use std::fmt;
use std::sync::Arc;

use gsv_types::ObjectHash;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::StoreResult;
use crate::traits::RawObjectStore;

/// A byte stream over object content. Every open returns a fresh one.
pub type ObjectStream = Box<dyn AsyncRead + Send + Unpin>;

/// Reference to one object inside one repository.
///
/// An `ObjectRef` is a view over externally-owned storage: it carries the
/// object's hash and the store able to read it. Two references are equal when
/// they name the same hash in the same repository.
#[derive(Clone)]
pub struct ObjectRef {
    repository: Arc<str>,
    hash: ObjectHash,
    store: Arc<dyn RawObjectStore>,
}

impl ObjectRef {
    pub fn new(
        repository: impl Into<Arc<str>>,
        store: Arc<dyn RawObjectStore>,
        hash: ObjectHash,
    ) -> Self {
        Self {
            repository: repository.into(),
            hash,
            store,
        }
    }

    pub fn hash(&self) -> &ObjectHash {
        &self.hash
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Open the raw (unfiltered) object bytes.
    pub async fn open(&self) -> StoreResult<ObjectStream> {
        self.store.open_object(&self.hash).await
    }

    /// Raw object size, using the store's cheap size query.
    pub async fn size(&self) -> StoreResult<u64> {
        self.store.size_of(&self.hash).await
    }

    /// Read at most `limit` raw bytes. Used for small payloads such as
    /// pointer documents.
    pub async fn read_prefix(&self, limit: u64) -> StoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.open().await?.take(limit).read_to_end(&mut buf).await?;
        Ok(buf)
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.repository == other.repository
    }
}

impl Eq for ObjectRef {}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRef")
            .field("repository", &self.repository)
            .field("hash", &self.hash)
            .finish()
    }
}
