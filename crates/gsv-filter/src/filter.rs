use std::sync::Arc;

use async_trait::async_trait;
use gsv_lfs::LfsStorage;
use gsv_store::{MetadataStore, ObjectRef, ObjectStream};

use crate::error::FilterResult;
use crate::lfs::LfsFilter;
use crate::link::LinkFilter;
use crate::raw::RawFilter;

/// A transform applied to raw object bytes before they are served.
///
/// Filters are stateless apart from their cache handle; every method may be
/// called concurrently.
#[async_trait]
pub trait ContentFilter: Send + Sync {
    /// Stable unique name. Used as cache namespace and content hash tag.
    fn name(&self) -> &str;

    /// Open a fresh stream over the filtered content.
    async fn open_stream(&self, obj: &ObjectRef) -> FilterResult<ObjectStream>;

    /// Identity of the filtered content. Two objects with equal content
    /// hashes serve equal bytes.
    async fn content_hash(&self, obj: &ObjectRef) -> FilterResult<String> {
        Ok(format!("{} {}", self.name(), obj.hash()))
    }

    /// Hex MD5 of the filtered content.
    async fn md5(&self, obj: &ObjectRef) -> FilterResult<String>;

    /// Size of the filtered content in bytes.
    async fn size(&self, obj: &ObjectRef) -> FilterResult<u64>;
}

/// The closed set of filters a repository can apply.
#[derive(Clone, Debug)]
pub enum Filter {
    Raw(RawFilter),
    Link(LinkFilter),
    Lfs(LfsFilter),
}

impl Filter {
    pub fn raw(store: Arc<dyn MetadataStore>) -> Self {
        Self::Raw(RawFilter::new(store))
    }

    pub fn link(store: Arc<dyn MetadataStore>) -> Self {
        Self::Link(LinkFilter::new(store))
    }

    pub fn lfs(storage: Arc<dyn LfsStorage>, store: Arc<dyn MetadataStore>) -> Self {
        Self::Lfs(LfsFilter::new(storage, store))
    }

    fn inner(&self) -> &dyn ContentFilter {
        match self {
            Self::Raw(f) => f,
            Self::Link(f) => f,
            Self::Lfs(f) => f,
        }
    }
}

impl From<RawFilter> for Filter {
    fn from(f: RawFilter) -> Self {
        Self::Raw(f)
    }
}

impl From<LinkFilter> for Filter {
    fn from(f: LinkFilter) -> Self {
        Self::Link(f)
    }
}

impl From<LfsFilter> for Filter {
    fn from(f: LfsFilter) -> Self {
        Self::Lfs(f)
    }
}

#[async_trait]
impl ContentFilter for Filter {
    fn name(&self) -> &str {
        self.inner().name()
    }

    async fn open_stream(&self, obj: &ObjectRef) -> FilterResult<ObjectStream> {
        self.inner().open_stream(obj).await
    }

    async fn content_hash(&self, obj: &ObjectRef) -> FilterResult<String> {
        self.inner().content_hash(obj).await
    }

    async fn md5(&self, obj: &ObjectRef) -> FilterResult<String> {
        self.inner().md5(obj).await
    }

    async fn size(&self, obj: &ObjectRef) -> FilterResult<u64> {
        self.inner().size(obj).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gsv_lfs::{InMemoryClientFactory, InMemoryLfsServer, RemoteStorage};
    use gsv_store::{InMemoryMetadataStore, InMemoryRawStore};

    #[tokio::test]
    async fn dispatches_to_variant() {
        let store: Arc<dyn MetadataStore> = Arc::new(InMemoryMetadataStore::new());
        let storage = Arc::new(RemoteStorage::new(Arc::new(InMemoryClientFactory::new(
            InMemoryLfsServer::new(),
        ))));
        let filters = [
            Filter::raw(store.clone()),
            Filter::link(store.clone()),
            Filter::lfs(storage, store),
        ];
        let names: Vec<_> = filters.iter().map(|f| f.name()).collect();
        assert_eq!(names, ["raw", "link", "lfs"]);

        let raw = Arc::new(InMemoryRawStore::new());
        let obj = ObjectRef::new("repo", raw.clone(), raw.insert(b"abc".to_vec()));
        let sizes = [
            filters[0].size(&obj).await.unwrap(),
            filters[1].size(&obj).await.unwrap(),
            filters[2].size(&obj).await.unwrap(),
        ];
        assert_eq!(sizes, [3, 8, 3]);
        assert_eq!(
            filters[1].content_hash(&obj).await.unwrap(),
            format!("link {}", obj.hash())
        );
    }
}
