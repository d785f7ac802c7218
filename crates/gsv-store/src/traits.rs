use async_trait::async_trait;
use gsv_types::ObjectHash;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::object::ObjectStream;

/// Read access to the repository's raw object database.
///
/// Implementations must support both a cheap size-only query and a full
/// byte read, and must be safe to share across tasks.
#[async_trait]
pub trait RawObjectStore: Send + Sync {
    /// Open a fresh stream over the object's raw bytes.
    ///
    /// Returns `Err(StoreError::NotFound)` if the object does not exist.
    async fn open_object(&self, hash: &ObjectHash) -> StoreResult<ObjectStream>;

    /// Size of the object in bytes, without reading its content.
    async fn size_of(&self, hash: &ObjectHash) -> StoreResult<u64>;
}

/// A value held in a metadata table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheValue {
    Str(String),
    U64(u64),
}

/// Persistent key-value store backing the filter metadata cache.
///
/// Tables are plain string namespaces. Implementations must be safe for
/// concurrent readers and writers, and `put_if_absent` must be atomic per
/// key: of two racing writers exactly one value is stored.
pub trait MetadataStore: Send + Sync {
    /// Look up `key` in `table`.
    fn get(&self, table: &str, key: &str) -> StoreResult<Option<CacheValue>>;

    /// Store `value` unless `key` is already present.
    ///
    /// Returns the previous value when one existed (and was kept), or `None`
    /// when `value` was written.
    fn put_if_absent(
        &self,
        table: &str,
        key: &str,
        value: CacheValue,
    ) -> StoreResult<Option<CacheValue>>;

    fn get_str(&self, table: &str, key: &str) -> StoreResult<Option<String>> {
        match self.get(table, key)? {
            None => Ok(None),
            Some(CacheValue::Str(s)) => Ok(Some(s)),
            Some(CacheValue::U64(_)) => Err(mismatch(table, key, "string")),
        }
    }

    fn get_u64(&self, table: &str, key: &str) -> StoreResult<Option<u64>> {
        match self.get(table, key)? {
            None => Ok(None),
            Some(CacheValue::U64(v)) => Ok(Some(v)),
            Some(CacheValue::Str(_)) => Err(mismatch(table, key, "u64")),
        }
    }
}

fn mismatch(table: &str, key: &str, expected: &'static str) -> StoreError {
    StoreError::TypeMismatch {
        table: table.to_string(),
        key: key.to_string(),
        expected,
    }
}
