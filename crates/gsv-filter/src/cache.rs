use std::sync::Arc;

use gsv_store::{CacheValue, MetadataStore, StoreResult};
use gsv_types::ObjectHash;

/// Handle on one filter's slice of the metadata store.
///
/// Each filter owns two tables, `cache.filter.<name>.md5` and
/// `cache.filter.<name>.size`, keyed by raw object hash. Filters with the
/// same name share them.
#[derive(Clone)]
pub struct FilterCache {
    store: Arc<dyn MetadataStore>,
    md5_table: String,
    size_table: String,
}

impl FilterCache {
    pub fn new(store: Arc<dyn MetadataStore>, filter_name: &str) -> Self {
        Self {
            store,
            md5_table: format!("cache.filter.{filter_name}.md5"),
            size_table: format!("cache.filter.{filter_name}.size"),
        }
    }

    pub fn md5_table(&self) -> &str {
        &self.md5_table
    }

    pub fn size_table(&self) -> &str {
        &self.size_table
    }

    pub fn md5(&self, hash: &ObjectHash) -> StoreResult<Option<String>> {
        self.store.get_str(&self.md5_table, &hash.to_hex())
    }

    pub fn size(&self, hash: &ObjectHash) -> StoreResult<Option<u64>> {
        self.store.get_u64(&self.size_table, &hash.to_hex())
    }

    pub fn put_md5(&self, hash: &ObjectHash, md5: &str) -> StoreResult<()> {
        self.store
            .put_if_absent(&self.md5_table, &hash.to_hex(), CacheValue::Str(md5.to_string()))?;
        Ok(())
    }

    pub fn put_size(&self, hash: &ObjectHash, size: u64) -> StoreResult<()> {
        self.store
            .put_if_absent(&self.size_table, &hash.to_hex(), CacheValue::U64(size))?;
        Ok(())
    }
}

impl std::fmt::Debug for FilterCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterCache")
            .field("md5_table", &self.md5_table)
            .field("size_table", &self.size_table)
            .finish()
    }
}
