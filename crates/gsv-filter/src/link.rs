//! Symlink filter.
//!
//! Git stores a symlink as a blob holding the target path. Subversion
//! clients expect the special-file form, which is the same bytes behind a
//! `link ` marker.

use std::io::Cursor;
use std::sync::Arc;

use async_trait::async_trait;
use gsv_store::{MetadataStore, ObjectRef, ObjectStream};
use tokio::io::AsyncReadExt;

use crate::cache::FilterCache;
use crate::error::FilterResult;
use crate::filter::ContentFilter;
use crate::metadata;

/// Marker prepended to symlink targets.
pub const LINK_PREFIX: &[u8] = b"link ";

#[derive(Clone, Debug)]
pub struct LinkFilter {
    cache: FilterCache,
}

impl LinkFilter {
    pub const NAME: &'static str = "link";

    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self {
            cache: FilterCache::new(store, Self::NAME),
        }
    }
}

#[async_trait]
impl ContentFilter for LinkFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn open_stream(&self, obj: &ObjectRef) -> FilterResult<ObjectStream> {
        let raw = obj.open().await?;
        Ok(Box::new(Cursor::new(LINK_PREFIX).chain(raw)))
    }

    async fn md5(&self, obj: &ObjectRef) -> FilterResult<String> {
        metadata::get_md5(self, &self.cache, obj, false).await
    }

    /// Raw size plus the marker. Never reads the content.
    async fn size(&self, obj: &ObjectRef) -> FilterResult<u64> {
        Ok(obj.size().await? + LINK_PREFIX.len() as u64)
    }
}
