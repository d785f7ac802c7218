use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use gsv_types::ObjectHash;

use crate::error::{StoreError, StoreResult};
use crate::object::ObjectStream;
use crate::traits::{CacheValue, MetadataStore, RawObjectStore};

/// In-memory, HashMap-based raw object store.
///
/// Intended for tests and embedding. Counts content opens and size queries
/// separately, so callers can observe which access path was taken.
pub struct InMemoryRawStore {
    objects: RwLock<HashMap<ObjectHash, Vec<u8>>>,
    opens: AtomicUsize,
    size_queries: AtomicUsize,
}

impl InMemoryRawStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            opens: AtomicUsize::new(0),
            size_queries: AtomicUsize::new(0),
        }
    }

    /// Store a blob and return its hash. Inserting the same content twice is
    /// a no-op.
    pub fn insert(&self, data: Vec<u8>) -> ObjectHash {
        let hash = ObjectHash::for_blob(&data);
        self.insert_as(hash, data);
        hash
    }

    /// Store a blob under a name computed elsewhere, such as a SHA-1 git
    /// object id.
    pub fn insert_as(&self, hash: ObjectHash, data: Vec<u8>) {
        self.objects
            .write()
            .expect("lock poisoned")
            .entry(hash)
            .or_insert(data);
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// How many content streams have been opened so far.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// How many size-only queries have been served so far.
    pub fn size_query_count(&self) -> usize {
        self.size_queries.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryRawStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RawObjectStore for InMemoryRawStore {
    async fn open_object(&self, hash: &ObjectHash) -> StoreResult<ObjectStream> {
        let data = self
            .objects
            .read()
            .expect("lock poisoned")
            .get(hash)
            .cloned()
            .ok_or(StoreError::NotFound(*hash))?;
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(Cursor::new(data)))
    }

    async fn size_of(&self, hash: &ObjectHash) -> StoreResult<u64> {
        let map = self.objects.read().expect("lock poisoned");
        let data = map.get(hash).ok_or(StoreError::NotFound(*hash))?;
        self.size_queries.fetch_add(1, Ordering::SeqCst);
        Ok(data.len() as u64)
    }
}

impl std::fmt::Debug for InMemoryRawStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRawStore")
            .field("object_count", &self.len())
            .finish()
    }
}

/// In-memory metadata store.
///
/// All tables live in one map behind a `RwLock`; `put_if_absent` runs under
/// the write lock, which makes it atomic per key. Data is lost on drop.
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    tables: RwLock<HashMap<String, HashMap<String, CacheValue>>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in `table`.
    pub fn table_len(&self, table: &str) -> usize {
        self.tables
            .read()
            .expect("lock poisoned")
            .get(table)
            .map_or(0, HashMap::len)
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn get(&self, table: &str, key: &str) -> StoreResult<Option<CacheValue>> {
        let tables = self.tables.read().expect("lock poisoned");
        Ok(tables.get(table).and_then(|t| t.get(key)).cloned())
    }

    fn put_if_absent(
        &self,
        table: &str,
        key: &str,
        value: CacheValue,
    ) -> StoreResult<Option<CacheValue>> {
        let mut tables = self.tables.write().expect("lock poisoned");
        let entries = tables.entry(table.to_string()).or_default();
        if let Some(previous) = entries.get(key) {
            return Ok(Some(previous.clone()));
        }
        entries.insert(key.to_string(), value);
        Ok(None)
    }
}
