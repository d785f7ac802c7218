//! LFS pointer resolution.
//!
//! Blobs that hold an LFS pointer document are served as the large object
//! the pointer names, fetched from remote storage. Any other blob is served
//! unchanged.

use std::sync::Arc;

use async_trait::async_trait;
use gsv_lfs::{LfsReader, LfsStorage, Pointer, MAX_POINTER_SIZE};
use gsv_store::{MetadataStore, ObjectRef, ObjectStream};
use gsv_types::Principal;
use tracing::debug;

use crate::cache::FilterCache;
use crate::error::{FilterError, FilterResult};
use crate::filter::ContentFilter;
use crate::metadata;

#[derive(Clone)]
pub struct LfsFilter {
    storage: Arc<dyn LfsStorage>,
    cache: FilterCache,
}

impl LfsFilter {
    pub const NAME: &'static str = "lfs";

    pub fn new(storage: Arc<dyn LfsStorage>, store: Arc<dyn MetadataStore>) -> Self {
        Self {
            storage,
            cache: FilterCache::new(store, Self::NAME),
        }
    }

    /// The pointer held by `obj`, if it holds one.
    pub async fn pointer(&self, obj: &ObjectRef) -> FilterResult<Option<Pointer>> {
        if obj.size().await? > MAX_POINTER_SIZE {
            return Ok(None);
        }
        let data = obj.read_prefix(MAX_POINTER_SIZE).await?;
        Ok(Pointer::parse(&data)?)
    }

    async fn reader(&self, obj: &ObjectRef, pointer: &Pointer) -> FilterResult<Box<dyn LfsReader>> {
        let oid = pointer.oid();
        self.storage
            .get_reader(&oid, &Principal::anonymous())
            .await?
            .ok_or_else(|| FilterError::RemoteObjectMissing {
                oid,
                object: *obj.hash(),
            })
    }
}

impl std::fmt::Debug for LfsFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LfsFilter").field("cache", &self.cache).finish()
    }
}

#[async_trait]
impl ContentFilter for LfsFilter {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn open_stream(&self, obj: &ObjectRef) -> FilterResult<ObjectStream> {
        match self.pointer(obj).await? {
            Some(pointer) => Ok(self.reader(obj, &pointer).await?.open_stream().await?),
            None => Ok(obj.open().await?),
        }
    }

    /// Keyed by the large object, so every pointer to it shares one hash.
    async fn content_hash(&self, obj: &ObjectRef) -> FilterResult<String> {
        match self.pointer(obj).await? {
            Some(pointer) => Ok(format!("{} {}", Self::NAME, pointer.oid())),
            None => Ok(format!("{} {}", Self::NAME, obj.hash())),
        }
    }

    async fn md5(&self, obj: &ObjectRef) -> FilterResult<String> {
        if let Some(md5) = self.cache.md5(obj.hash())? {
            return Ok(md5);
        }
        match self.pointer(obj).await? {
            Some(pointer) => {
                // One negotiation serves both the known-md5 and streaming paths.
                let reader = self.reader(obj, &pointer).await?;
                if let Some(md5) = reader.md5() {
                    debug!(oid = %pointer.oid(), "md5 known by LFS storage");
                    self.cache.put_md5(obj.hash(), md5)?;
                    return Ok(md5.to_string());
                }
                let stream = reader.open_stream().await?;
                metadata::md5_of_stream(Self::NAME, &self.cache, obj, stream, true).await
            }
            None => metadata::get_md5(self, &self.cache, obj, true).await,
        }
    }

    async fn size(&self, obj: &ObjectRef) -> FilterResult<u64> {
        if let Some(size) = self.cache.size(obj.hash())? {
            return Ok(size);
        }
        match self.pointer(obj).await? {
            Some(pointer) => Ok(pointer.size()),
            None => Ok(obj.size().await?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use gsv_lfs::{
        InMemoryClientFactory, InMemoryLfsServer, LfsError, LfsResult, LfsWriter, RemoteStorage,
    };
    use gsv_store::{InMemoryMetadataStore, InMemoryRawStore};
    use gsv_types::{BranchRef, LockDesc, LockTarget, UnlockTarget, VerifyLocksResult};
    use tokio::io::AsyncReadExt;

    /// Counts download negotiations; everything else is forwarded.
    struct CountingStorage {
        inner: RemoteStorage,
        readers: AtomicUsize,
    }

    #[async_trait]
    impl LfsStorage for CountingStorage {
        async fn get_reader(
            &self,
            oid: &str,
            principal: &Principal,
        ) -> LfsResult<Option<Box<dyn LfsReader>>> {
            self.readers.fetch_add(1, Ordering::SeqCst);
            self.inner.get_reader(oid, principal).await
        }

        fn get_writer(&self, principal: &Principal) -> Box<dyn LfsWriter> {
            self.inner.get_writer(principal)
        }

        async fn lock(
            &self,
            principal: &Principal,
            branch: Option<&BranchRef>,
            comment: Option<&str>,
            steal: bool,
            targets: &[LockTarget],
        ) -> LfsResult<Vec<LockDesc>> {
            self.inner.lock(principal, branch, comment, steal, targets).await
        }

        async fn unlock(
            &self,
            principal: &Principal,
            branch: Option<&BranchRef>,
            break_lock: bool,
            targets: &[UnlockTarget],
        ) -> LfsResult<Vec<LockDesc>> {
            self.inner.unlock(principal, branch, break_lock, targets).await
        }

        async fn get_locks(
            &self,
            principal: &Principal,
            branch: Option<&BranchRef>,
            path: Option<&str>,
            lock_id: Option<&str>,
        ) -> LfsResult<Vec<LockDesc>> {
            self.inner.get_locks(principal, branch, path, lock_id).await
        }

        async fn verify_locks(
            &self,
            principal: &Principal,
            branch: Option<&BranchRef>,
        ) -> LfsResult<VerifyLocksResult> {
            self.inner.verify_locks(principal, branch).await
        }
    }

    struct Fixture {
        raw: Arc<InMemoryRawStore>,
        server: InMemoryLfsServer,
        storage: Arc<CountingStorage>,
        filter: LfsFilter,
    }

    fn fixture() -> Fixture {
        let server = InMemoryLfsServer::new();
        let storage = Arc::new(CountingStorage {
            inner: RemoteStorage::new(Arc::new(InMemoryClientFactory::new(server.clone()))),
            readers: AtomicUsize::new(0),
        });
        Fixture {
            raw: Arc::new(InMemoryRawStore::new()),
            server,
            filter: LfsFilter::new(storage.clone(), Arc::new(InMemoryMetadataStore::new())),
            storage,
        }
    }

    impl Fixture {
        fn blob(&self, data: &[u8]) -> ObjectRef {
            ObjectRef::new("repo", self.raw.clone(), self.raw.insert(data.to_vec()))
        }

        fn pointer_to(&self, content: &[u8]) -> (Pointer, ObjectRef) {
            let hash = self.server.insert_object(content);
            let pointer = Pointer::new(hash, content.len() as u64).unwrap();
            let obj = self.blob(&pointer.to_bytes());
            (pointer, obj)
        }
    }

    async fn read(filter: &LfsFilter, obj: &ObjectRef) -> FilterResult<Vec<u8>> {
        let mut out = Vec::new();
        filter.open_stream(obj).await?.read_to_end(&mut out).await?;
        Ok(out)
    }

    #[tokio::test]
    async fn resolves_pointer_to_remote_content() {
        let fx = fixture();
        let (pointer, obj) = fx.pointer_to(b"hello world");

        assert_eq!(read(&fx.filter, &obj).await.unwrap(), b"hello world");
        assert_eq!(fx.filter.size(&obj).await.unwrap(), 11);
        assert_eq!(
            fx.filter.md5(&obj).await.unwrap(),
            "5eb63bbbe01eeed093cb22bb8f5acdc3"
        );
        assert_eq!(
            fx.filter.content_hash(&obj).await.unwrap(),
            format!("lfs {}", pointer.oid())
        );
    }

    #[tokio::test]
    async fn md5_miss_negotiates_one_download() {
        let fx = fixture();
        let (_pointer, obj) = fx.pointer_to(b"hello world");

        assert_eq!(
            fx.filter.md5(&obj).await.unwrap(),
            "5eb63bbbe01eeed093cb22bb8f5acdc3"
        );
        assert_eq!(fx.storage.readers.load(Ordering::SeqCst), 1);

        fx.filter.md5(&obj).await.unwrap();
        assert_eq!(fx.filter.size(&obj).await.unwrap(), 11);
        assert_eq!(fx.storage.readers.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn md5_is_cached_after_first_download() {
        let fx = fixture();
        let (_pointer, obj) = fx.pointer_to(b"large");
        let first = fx.filter.md5(&obj).await.unwrap();

        // Remote copy gone: the cached value is still served.
        fx.server.set_empty_batches(true);
        assert_eq!(fx.filter.md5(&obj).await.unwrap(), first);
        assert_eq!(fx.filter.size(&obj).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn pointers_to_the_same_object_share_content_hash() {
        let fx = fixture();
        let (pointer, a) = fx.pointer_to(b"shared");
        let mut text = pointer.to_bytes();
        text.extend_from_slice(b"ext-0-foo sha256:00\n");
        let b = fx.blob(&text);
        assert_ne!(a.hash(), b.hash());
        assert_eq!(
            fx.filter.content_hash(&a).await.unwrap(),
            fx.filter.content_hash(&b).await.unwrap()
        );
    }

    #[tokio::test]
    async fn plain_blobs_pass_through() {
        let fx = fixture();
        let obj = fx.blob(b"not a pointer");
        assert_eq!(read(&fx.filter, &obj).await.unwrap(), b"not a pointer");
        assert_eq!(fx.filter.size(&obj).await.unwrap(), 13);
        assert_eq!(
            fx.filter.content_hash(&obj).await.unwrap(),
            format!("lfs {}", obj.hash())
        );
    }

    #[tokio::test]
    async fn large_blobs_are_never_parsed() {
        let fx = fixture();
        let mut data = b"version https://git-lfs.github.com/spec/v1\n".to_vec();
        data.resize(MAX_POINTER_SIZE as usize + 1, b'x');
        let obj = fx.blob(&data);
        assert_eq!(read(&fx.filter, &obj).await.unwrap(), data);
    }

    #[tokio::test]
    async fn malformed_pointer_is_an_error() {
        let fx = fixture();
        let obj = fx.blob(b"version https://git-lfs.github.com/spec/v1\nsize 3\n");
        assert!(matches!(
            read(&fx.filter, &obj).await,
            Err(FilterError::Lfs(LfsError::MalformedPointer(_)))
        ));
        assert!(fx.filter.size(&obj).await.is_err());
    }

    #[tokio::test]
    async fn missing_remote_object_is_an_error() {
        let fx = fixture();
        let pointer = Pointer::new("d".repeat(64), 10).unwrap();
        let obj = fx.blob(&pointer.to_bytes());
        match read(&fx.filter, &obj).await {
            Err(FilterError::RemoteObjectMissing { oid, object }) => {
                assert_eq!(oid, pointer.oid());
                assert_eq!(&object, obj.hash());
            }
            other => panic!("unexpected result: {other:?}"),
        }
        // Size comes from the pointer itself.
        assert_eq!(fx.filter.size(&obj).await.unwrap(), 10);
    }
}
