//! Large-object storage backed by a remote LFS service.
//!
//! Every operation negotiates through the batch API first and then transfers
//! through the links it was handed. Uploads are synchronous: one batch round
//! trip and one transfer per object.
//!
//! TODO: upload negotiation could be pipelined with the client still sending
//! content, awaiting all batches before the commit is finished.

use std::sync::Arc;

use async_trait::async_trait;
use gsv_store::ObjectStream;
use gsv_types::{BranchRef, LockDesc, LockTarget, Principal, UnlockTarget, VerifyLocksResult};
use tracing::{debug, error};

use crate::config::LfsConfig;
use crate::error::{LfsError, LfsResult};
use crate::http::HttpClientFactory;
use crate::locks::LockCoordinator;
use crate::pointer::strip_oid_prefix;
use crate::reader::{LfsReader, RemoteReader};
use crate::transport::{ClientFactory, LfsClient, StreamProvider};
use crate::types::{BatchReq, Links, Meta, ObjectRes, Operation};
use crate::writer::{LfsWriter, RemoteWriter};

/// Storage of large objects and their path locks.
#[async_trait]
pub trait LfsStorage: Send + Sync {
    /// Reader for `oid` (`sha256:`-prefixed), `None` if the object is unknown.
    async fn get_reader(
        &self,
        oid: &str,
        principal: &Principal,
    ) -> LfsResult<Option<Box<dyn LfsReader>>>;

    fn get_writer(&self, principal: &Principal) -> Box<dyn LfsWriter>;

    async fn lock(
        &self,
        principal: &Principal,
        branch: Option<&BranchRef>,
        comment: Option<&str>,
        steal: bool,
        targets: &[LockTarget],
    ) -> LfsResult<Vec<LockDesc>>;

    async fn unlock(
        &self,
        principal: &Principal,
        branch: Option<&BranchRef>,
        break_lock: bool,
        targets: &[UnlockTarget],
    ) -> LfsResult<Vec<LockDesc>>;

    async fn get_locks(
        &self,
        principal: &Principal,
        branch: Option<&BranchRef>,
        path: Option<&str>,
        lock_id: Option<&str>,
    ) -> LfsResult<Vec<LockDesc>>;

    async fn verify_locks(
        &self,
        principal: &Principal,
        branch: Option<&BranchRef>,
    ) -> LfsResult<VerifyLocksResult>;

    /// Drop locks that no longer match the branch. Returns whether anything
    /// changed.
    fn cleanup_invalid_locks(&self, _branch: &BranchRef) -> bool {
        false
    }

    fn renew_locks(&self, _branch: &BranchRef, _locks: &[LockDesc]) {}
}

/// [`LfsStorage`] over a [`ClientFactory`]. Cheap to clone.
#[derive(Clone)]
pub struct RemoteStorage {
    factory: Arc<dyn ClientFactory>,
    spill_threshold: usize,
}

impl RemoteStorage {
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            factory,
            spill_threshold: LfsConfig::default().spill_threshold,
        }
    }

    /// Storage talking HTTP to the configured endpoint.
    pub fn from_config(config: LfsConfig) -> Self {
        let spill_threshold = config.spill_threshold;
        Self {
            factory: Arc::new(HttpClientFactory::new(config)),
            spill_threshold,
        }
    }

    pub fn with_spill_threshold(mut self, spill_threshold: usize) -> Self {
        self.spill_threshold = spill_threshold;
        self
    }

    fn client(&self, principal: &Principal) -> LfsResult<Arc<dyn LfsClient>> {
        self.factory.client(principal)
    }

    /// Forget the cached client of `principal`.
    pub fn invalidate(&self, principal: &Principal) {
        self.factory.invalidate(principal);
    }

    /// Metadata of a stored object by bare hash, asked anonymously.
    pub async fn get_meta(&self, hash: &str) -> LfsResult<Option<ObjectRes>> {
        self.client(&Principal::anonymous())?.get_meta(hash).await
    }

    /// Upload one object by bare hash.
    ///
    /// An object the server already has is not transferred again.
    pub async fn put_object(
        &self,
        principal: &Principal,
        provider: &dyn StreamProvider,
        hash: &str,
        size: u64,
    ) -> LfsResult<()> {
        let client = self.client(principal)?;
        let req = BatchReq::new(Operation::Upload, vec![Meta::new(hash, size)]);
        let res = client.post_batch(&req).await?;
        if res.objects.is_empty() {
            return Err(LfsError::EmptyBatch {
                operation: Operation::Upload,
                oid: hash.to_string(),
            });
        }

        for item in &res.objects {
            if let Some(err) = &item.error {
                return Err(LfsError::Item {
                    oid: item.oid.clone(),
                    code: err.code,
                    message: err.message.clone(),
                });
            }
            if !client.put_object(provider, &item.meta(), &item.actions).await? {
                debug!(oid = %item.oid, "LFS object already stored");
            }
        }
        Ok(())
    }

    /// Download through a descriptor's links, anonymously.
    pub async fn get_object(&self, links: &Links) -> LfsResult<ObjectStream> {
        self.client(&Principal::anonymous())?.get_object(links).await
    }

    /// Negotiate a download of `oid` as `principal`.
    ///
    /// `None` when the oid lacks the `sha256:` prefix, the server returns no
    /// items, or the item carries an error.
    pub async fn fetch_reader(
        &self,
        oid: &str,
        principal: &Principal,
    ) -> LfsResult<Option<RemoteReader>> {
        let Some(hash) = strip_oid_prefix(oid) else {
            return Ok(None);
        };
        let client = self.client(principal)?;
        let req = BatchReq::new(Operation::Download, vec![Meta::new(hash, 0)]);
        let res = match client.post_batch(&req).await {
            Ok(res) => res,
            Err(e) => {
                error!(oid, error = %e, "LFS batch request failed");
                return Err(e);
            }
        };

        let Some(item) = res.objects.into_iter().next() else {
            debug!(oid, "empty LFS batch response");
            return Ok(None);
        };
        if let Some(err) = &item.error {
            debug!(oid, code = err.code, message = %err.message, "LFS object unavailable");
            return Ok(None);
        }
        let meta = item.meta();
        Ok(Some(RemoteReader::new(self.clone(), meta, item.actions)))
    }

    /// [`fetch_reader`](Self::fetch_reader) as the anonymous principal.
    pub async fn get_anonymous_reader(&self, oid: &str) -> LfsResult<Option<RemoteReader>> {
        self.fetch_reader(oid, &Principal::anonymous()).await
    }

    fn coordinator<'a>(
        &self,
        principal: &Principal,
        branch: Option<&'a BranchRef>,
    ) -> LfsResult<LockCoordinator<'a>> {
        Ok(LockCoordinator::new(self.client(principal)?, branch))
    }
}

#[async_trait]
impl LfsStorage for RemoteStorage {
    async fn get_reader(
        &self,
        oid: &str,
        principal: &Principal,
    ) -> LfsResult<Option<Box<dyn LfsReader>>> {
        Ok(self
            .fetch_reader(oid, principal)
            .await?
            .map(|reader| Box::new(reader) as Box<dyn LfsReader>))
    }

    fn get_writer(&self, principal: &Principal) -> Box<dyn LfsWriter> {
        Box::new(RemoteWriter::new(
            self.clone(),
            principal.clone(),
            self.spill_threshold,
        ))
    }

    async fn lock(
        &self,
        principal: &Principal,
        branch: Option<&BranchRef>,
        comment: Option<&str>,
        steal: bool,
        targets: &[LockTarget],
    ) -> LfsResult<Vec<LockDesc>> {
        self.coordinator(principal, branch)?
            .lock(comment, steal, targets)
            .await
    }

    async fn unlock(
        &self,
        principal: &Principal,
        branch: Option<&BranchRef>,
        break_lock: bool,
        targets: &[UnlockTarget],
    ) -> LfsResult<Vec<LockDesc>> {
        self.coordinator(principal, branch)?
            .unlock(break_lock, targets)
            .await
    }

    async fn get_locks(
        &self,
        principal: &Principal,
        branch: Option<&BranchRef>,
        path: Option<&str>,
        lock_id: Option<&str>,
    ) -> LfsResult<Vec<LockDesc>> {
        self.coordinator(principal, branch)?
            .locks(path, lock_id)
            .await
    }

    async fn verify_locks(
        &self,
        principal: &Principal,
        branch: Option<&BranchRef>,
    ) -> LfsResult<VerifyLocksResult> {
        self.coordinator(principal, branch)?.verify().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryClientFactory, InMemoryLfsServer};
    use crate::pointer::OID_PREFIX;
    use crate::spill::SpillBuffer;
    use tokio::io::AsyncReadExt;

    fn storage() -> (RemoteStorage, Arc<InMemoryClientFactory>) {
        let factory = Arc::new(InMemoryClientFactory::new(InMemoryLfsServer::new()));
        (RemoteStorage::new(factory.clone()), factory)
    }

    async fn read_all(mut stream: ObjectStream) -> Vec<u8> {
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn reader_streams_remote_object() {
        let (storage, factory) = storage();
        let hash = factory.server().insert_object(b"large payload");

        let reader = storage
            .get_reader(&format!("{OID_PREFIX}{hash}"), &Principal::user("alice"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reader.hash(), hash);
        assert_eq!(reader.oid(), format!("sha256:{hash}"));
        assert_eq!(reader.size(), 13);
        assert_eq!(reader.md5(), None);
        assert_eq!(read_all(reader.open_stream().await.unwrap()).await, b"large payload");
        // Fresh stream per open.
        assert_eq!(read_all(reader.open_stream().await.unwrap()).await, b"large payload");
    }

    #[tokio::test]
    async fn oid_without_prefix_is_absent() {
        let (storage, factory) = storage();
        let hash = factory.server().insert_object(b"x");
        assert!(storage.get_anonymous_reader(&hash).await.unwrap().is_none());
        assert!(storage
            .get_anonymous_reader(&format!("md5:{hash}"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn empty_batch_is_absent_for_reads() {
        let (storage, factory) = storage();
        let hash = factory.server().insert_object(b"x");
        factory.server().set_empty_batches(true);
        assert!(storage
            .get_anonymous_reader(&format!("{OID_PREFIX}{hash}"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn item_error_is_absent_for_reads() {
        let (storage, factory) = storage();
        let hash = factory.server().insert_object(b"x");
        factory.server().fail_item(&hash, 410, "gone");
        assert!(storage
            .get_anonymous_reader(&format!("{OID_PREFIX}{hash}"))
            .await
            .unwrap()
            .is_none());

        let unknown = format!("{OID_PREFIX}{}", "0".repeat(64));
        assert!(storage.get_anonymous_reader(&unknown).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn writer_uploads_and_returns_oid() {
        let (storage, factory) = storage();
        let storage = storage.with_spill_threshold(4);
        let mut writer = storage.get_writer(&Principal::user("alice"));
        writer.write(b"hello ").await.unwrap();
        writer.write(b"world").await.unwrap();
        assert_eq!(writer.size(), 11);

        let oid = writer.finish().await.unwrap();
        let hash = oid.strip_prefix(OID_PREFIX).unwrap();
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(factory.server().object(hash).unwrap(), b"hello world");

        assert!(matches!(writer.finish().await, Err(LfsError::WriterFinished)));
        assert!(matches!(writer.write(b"more").await, Err(LfsError::WriterFinished)));
    }

    #[tokio::test]
    async fn failed_commit_can_be_retried() {
        let (storage, factory) = storage();
        let storage = storage.with_spill_threshold(4);
        let mut writer = storage.get_writer(&Principal::user("alice"));
        writer.write(b"hello world").await.unwrap();

        factory.server().set_empty_batches(true);
        assert!(matches!(
            writer.finish().await,
            Err(LfsError::EmptyBatch { .. })
        ));
        assert_eq!(writer.size(), 11);
        assert!(matches!(writer.write(b"!").await, Err(LfsError::WriterFinished)));
        assert_eq!(factory.server().object_count(), 0);

        factory.server().set_empty_batches(false);
        let oid = writer.finish().await.unwrap();
        assert_eq!(
            factory.server().object(oid.strip_prefix(OID_PREFIX).unwrap()).unwrap(),
            b"hello world"
        );
        assert!(matches!(writer.finish().await, Err(LfsError::WriterFinished)));
    }

    #[tokio::test]
    async fn writing_known_content_succeeds() {
        let (storage, factory) = storage();
        factory.server().insert_object(b"dup");
        let mut writer = storage.get_writer(&Principal::user("alice"));
        writer.write(b"dup").await.unwrap();
        writer.finish().await.unwrap();
        assert_eq!(factory.server().object_count(), 1);
    }

    async fn content(data: &[u8]) -> crate::spill::SpilledContent {
        let mut buffer = SpillBuffer::new(1024);
        buffer.write(data).await.unwrap();
        buffer.finish().await.unwrap()
    }

    #[tokio::test]
    async fn item_error_fails_uploads() {
        let (storage, factory) = storage();
        let hash = "a".repeat(64);
        factory.server().fail_item(&hash, 422, "validation failed");

        let err = storage
            .put_object(&Principal::user("alice"), &content(b"x").await, &hash, 1)
            .await
            .unwrap_err();
        match err {
            LfsError::Item { oid, code, message } => {
                assert_eq!(oid, hash);
                assert_eq!(code, 422);
                assert_eq!(message, "validation failed");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_batch_fails_uploads() {
        let (storage, factory) = storage();
        factory.server().set_empty_batches(true);
        let err = storage
            .put_object(&Principal::user("alice"), &content(b"x").await, "abc", 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LfsError::EmptyBatch {
                operation: Operation::Upload,
                ..
            }
        ));
        assert_eq!(err.to_string(), "empty batch response while uploading abc");
    }

    #[tokio::test]
    async fn rejected_transfer_fails_uploads() {
        let (storage, _factory) = storage();
        // Claimed hash does not match the content.
        let err = storage
            .put_object(&Principal::user("alice"), &content(b"x").await, &"b".repeat(64), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, LfsError::UploadRejected { .. }));
    }

    #[tokio::test]
    async fn metadata_lookup() {
        let (storage, factory) = storage();
        let hash = factory.server().insert_object(b"meta");
        let meta = storage.get_meta(&hash).await.unwrap().unwrap();
        assert_eq!(meta.size, 4);
        assert!(storage.get_meta(&"c".repeat(64)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lock_operations_delegate_to_coordinator() {
        let (storage, _factory) = storage();
        let alice = Principal::user("alice");
        let main = BranchRef::new("main").unwrap();

        let locked = storage
            .lock(&alice, Some(&main), None, false, &[LockTarget::new("/a.bin")])
            .await
            .unwrap();
        let listed = storage.get_locks(&alice, Some(&main), None, None).await.unwrap();
        assert_eq!(listed, locked);
        assert!(storage.get_locks(&alice, None, None, None).await.unwrap().is_empty());

        let verified = storage.verify_locks(&alice, Some(&main)).await.unwrap();
        assert_eq!(verified.ours, locked);

        let released = storage
            .unlock(&alice, Some(&main), false, &[UnlockTarget::by_path("/a.bin")])
            .await
            .unwrap();
        assert_eq!(released, locked);
    }

    #[test]
    fn maintenance_hooks_are_no_ops() {
        let (storage, factory) = storage();
        let main = BranchRef::new("main").unwrap();
        assert!(!storage.cleanup_invalid_locks(&main));
        storage.renew_locks(&main, &[]);

        storage.invalidate(&Principal::user("alice"));
        assert_eq!(factory.invalidation_count(), 1);
    }
}
