use std::sync::Arc;

use async_trait::async_trait;
use gsv_store::{MetadataStore, ObjectRef, ObjectStream};

use crate::cache::FilterCache;
use crate::error::FilterResult;
use crate::filter::ContentFilter;
use crate::metadata;

/// Serves raw object bytes unchanged.
#[derive(Clone, Debug)]
pub struct RawFilter {
    cache: FilterCache,
}

impl RawFilter {
    pub const NAME: &'static str = "raw";

    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self {
            cache: FilterCache::new(store, Self::NAME),
        }
    }
}

#[async_trait]
impl ContentFilter for RawFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn open_stream(&self, obj: &ObjectRef) -> FilterResult<ObjectStream> {
        Ok(obj.open().await?)
    }

    async fn md5(&self, obj: &ObjectRef) -> FilterResult<String> {
        metadata::get_md5(self, &self.cache, obj, false).await
    }

    async fn size(&self, obj: &ObjectRef) -> FilterResult<u64> {
        Ok(obj.size().await?)
    }
}
