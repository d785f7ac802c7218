//! In-process LFS service.
//!
//! Implements the batch and locking protocol over shared in-memory state so
//! storage and filter code can run without a network. Transfer links use the
//! `memory://<oid>` scheme and are only meaningful to clients of the same
//! server.

use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use gsv_store::ObjectStream;
use gsv_types::Principal;
use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::error::{LfsError, LfsResult};
use crate::transport::{ClientFactory, LfsClient, StreamProvider};
use crate::types::{
    BatchItem, BatchReq, BatchRes, ItemError, Link, Links, Lock, LockOwner, Meta, ObjectRes,
    Operation, Ref, VerifyLocksRes,
};

const LINK_SCHEME: &str = "memory://";

type LockKey = (Option<String>, String);

#[derive(Default)]
struct ServerState {
    objects: HashMap<String, Arc<[u8]>>,
    locks: BTreeMap<LockKey, Lock>,
    next_lock_id: u64,
    item_errors: HashMap<String, ItemError>,
    empty_batches: bool,
}

/// Shared in-memory LFS service. Clones share state.
#[derive(Clone, Default)]
pub struct InMemoryLfsServer {
    state: Arc<RwLock<ServerState>>,
}

impl InMemoryLfsServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store content directly, bypassing the batch protocol. Returns the
    /// bare SHA-256 hex hash.
    pub fn insert_object(&self, data: &[u8]) -> String {
        let hash = hex::encode(Sha256::digest(data));
        self.state
            .write()
            .expect("lock poisoned")
            .objects
            .insert(hash.clone(), Arc::from(data));
        hash
    }

    pub fn object(&self, hash: &str) -> Option<Vec<u8>> {
        self.state
            .read()
            .expect("lock poisoned")
            .objects
            .get(hash)
            .map(|data| data.to_vec())
    }

    pub fn object_count(&self) -> usize {
        self.state.read().expect("lock poisoned").objects.len()
    }

    /// Make every batch item for `hash` carry the given error.
    pub fn fail_item(&self, hash: &str, code: i32, message: &str) {
        self.state.write().expect("lock poisoned").item_errors.insert(
            hash.to_string(),
            ItemError {
                code,
                message: message.to_string(),
            },
        );
    }

    /// Answer every batch request with an empty object list.
    pub fn set_empty_batches(&self, empty: bool) {
        self.state.write().expect("lock poisoned").empty_batches = empty;
    }

    pub fn lock_count(&self) -> usize {
        self.state.read().expect("lock poisoned").locks.len()
    }

    /// A client acting as `principal`. Lock ownership is by login.
    pub fn client(&self, principal: &Principal) -> InMemoryLfsClient {
        InMemoryLfsClient {
            server: self.clone(),
            owner: principal.login().to_string(),
        }
    }

    fn batch_item(state: &ServerState, operation: Operation, meta: &Meta) -> BatchItem {
        let mut item = BatchItem {
            oid: meta.oid.clone(),
            size: meta.size,
            actions: Links::new(),
            error: None,
        };
        if let Some(error) = state.item_errors.get(&meta.oid) {
            item.error = Some(error.clone());
            return item;
        }
        let link = Link::new(format!("{LINK_SCHEME}{}", meta.oid));
        match (operation, state.objects.get(&meta.oid)) {
            (Operation::Download, Some(data)) => {
                item.size = data.len() as u64;
                item.actions = Links::new().with(Links::DOWNLOAD, link);
            }
            (Operation::Download, None) => {
                item.error = Some(ItemError {
                    code: 404,
                    message: "Object does not exist".into(),
                });
            }
            // Already stored: nothing to transfer.
            (Operation::Upload, Some(_)) => {}
            (Operation::Upload, None) => {
                item.actions = Links::new().with(Links::UPLOAD, link);
            }
        }
        item
    }
}

/// Client view of an [`InMemoryLfsServer`] for one owner.
pub struct InMemoryLfsClient {
    server: InMemoryLfsServer,
    owner: String,
}

impl InMemoryLfsClient {
    fn link_oid(link: &Link) -> LfsResult<&str> {
        link.href
            .strip_prefix(LINK_SCHEME)
            .ok_or_else(|| LfsError::Api {
                endpoint: link.href.clone(),
                status: 400,
                body: "not an in-memory transfer link".into(),
            })
    }
}

#[async_trait]
impl LfsClient for InMemoryLfsClient {
    async fn get_meta(&self, hash: &str) -> LfsResult<Option<ObjectRes>> {
        let state = self.server.state.read().expect("lock poisoned");
        Ok(state.objects.get(hash).map(|data| ObjectRes {
            oid: hash.to_string(),
            size: data.len() as u64,
            links: Links::new().with(Links::DOWNLOAD, Link::new(format!("{LINK_SCHEME}{hash}"))),
        }))
    }

    async fn post_batch(&self, req: &BatchReq) -> LfsResult<BatchRes> {
        let state = self.server.state.read().expect("lock poisoned");
        if state.empty_batches {
            return Ok(BatchRes::default());
        }
        let objects = req
            .objects
            .iter()
            .map(|meta| InMemoryLfsServer::batch_item(&state, req.operation, meta))
            .collect();
        Ok(BatchRes {
            transfer: Some("basic".into()),
            objects,
        })
    }

    async fn put_object(
        &self,
        provider: &dyn StreamProvider,
        meta: &Meta,
        links: &Links,
    ) -> LfsResult<bool> {
        let Some(upload) = links.upload() else {
            return Ok(false);
        };
        let target = Self::link_oid(upload)?;

        let mut data = Vec::new();
        provider.open_stream().await?.read_to_end(&mut data).await?;
        let actual = hex::encode(Sha256::digest(&data));
        if actual != target || data.len() as u64 != meta.size {
            return Err(LfsError::UploadRejected {
                oid: meta.oid.clone(),
                reason: format!(
                    "content mismatch: got {actual} ({} bytes), expected {target} ({} bytes)",
                    data.len(),
                    meta.size
                ),
            });
        }

        self.server
            .state
            .write()
            .expect("lock poisoned")
            .objects
            .insert(actual, data.into());
        Ok(true)
    }

    async fn get_object(&self, links: &Links) -> LfsResult<ObjectStream> {
        let download = links
            .download()
            .ok_or(LfsError::MissingLink(Links::DOWNLOAD))?;
        let hash = Self::link_oid(download)?;
        let state = self.server.state.read().expect("lock poisoned");
        let data = state.objects.get(hash).cloned().ok_or_else(|| LfsError::Api {
            endpoint: download.href.clone(),
            status: 404,
            body: "Object does not exist".into(),
        })?;
        Ok(Box::new(Cursor::new(data)))
    }

    async fn lock(&self, path: &str, reference: Option<&Ref>) -> LfsResult<Lock> {
        let mut state = self.server.state.write().expect("lock poisoned");
        let key = (reference.map(|r| r.name.clone()), path.to_string());
        if let Some(existing) = state.locks.get(&key) {
            return Err(LfsError::LockConflict {
                lock: existing.clone(),
                message: "already created lock".into(),
            });
        }
        state.next_lock_id += 1;
        let lock = Lock {
            id: state.next_lock_id.to_string(),
            path: path.to_string(),
            owner: Some(LockOwner {
                name: self.owner.clone(),
            }),
            locked_at: Utc::now(),
        };
        debug!(path, id = %lock.id, owner = %self.owner, "created lock");
        state.locks.insert(key, lock.clone());
        Ok(lock)
    }

    async fn unlock(
        &self,
        id: &str,
        force: bool,
        reference: Option<&Ref>,
    ) -> LfsResult<Option<Lock>> {
        let mut state = self.server.state.write().expect("lock poisoned");
        let scope = reference.map(|r| r.name.clone());
        let Some(key) = state
            .locks
            .iter()
            .find(|((r, _), lock)| *r == scope && lock.id == id)
            .map(|(key, _)| key.clone())
        else {
            return Ok(None);
        };

        let owned = state.locks[&key]
            .owner
            .as_ref()
            .is_some_and(|o| o.name == self.owner);
        if !owned && !force {
            return Err(LfsError::Api {
                endpoint: format!("locks/{id}/unlock"),
                status: 403,
                body: format!("lock {id} is owned by another user"),
            });
        }
        Ok(state.locks.remove(&key))
    }

    async fn list_locks(
        &self,
        path: Option<&str>,
        id: Option<&str>,
        reference: Option<&Ref>,
    ) -> LfsResult<Vec<Lock>> {
        let state = self.server.state.read().expect("lock poisoned");
        let scope = reference.map(|r| r.name.as_str());
        Ok(state
            .locks
            .iter()
            .filter(|((r, _), _)| r.as_deref() == scope)
            .map(|(_, lock)| lock)
            .filter(|lock| path.map_or(true, |p| lock.path == p))
            .filter(|lock| id.map_or(true, |i| lock.id == i))
            .cloned()
            .collect())
    }

    async fn verify_locks(&self, reference: Option<&Ref>) -> LfsResult<VerifyLocksRes> {
        let locks = self.list_locks(None, None, reference).await?;
        let (ours, theirs): (Vec<Lock>, Vec<Lock>) = locks
            .into_iter()
            .partition(|lock| lock.owner.as_ref().is_some_and(|o| o.name == self.owner));
        Ok(VerifyLocksRes {
            ours,
            theirs,
            next_cursor: None,
        })
    }
}

/// [`ClientFactory`] over an [`InMemoryLfsServer`].
pub struct InMemoryClientFactory {
    server: InMemoryLfsServer,
    invalidations: AtomicUsize,
}

impl InMemoryClientFactory {
    pub fn new(server: InMemoryLfsServer) -> Self {
        Self {
            server,
            invalidations: AtomicUsize::new(0),
        }
    }

    pub fn server(&self) -> &InMemoryLfsServer {
        &self.server
    }

    pub fn invalidation_count(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }
}

impl ClientFactory for InMemoryClientFactory {
    fn client(&self, principal: &Principal) -> LfsResult<Arc<dyn LfsClient>> {
        Ok(Arc::new(self.server.client(principal)))
    }

    fn invalidate(&self, _principal: &Principal) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}
