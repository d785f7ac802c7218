//! Path lock coordination on top of an [`LfsClient`].
//!
//! The remote API has no batch locking call, so a multi-path request is a
//! sequence of single-path calls. Targets are processed strictly in order and
//! a failure stops the sequence without releasing locks acquired before it.

use std::sync::Arc;

use gsv_types::{BranchRef, LockDesc, LockTarget, UnlockTarget, VerifyLocksResult};
use tracing::{debug, warn};

use crate::error::{LfsError, LfsResult};
use crate::transport::LfsClient;
use crate::types::{Lock, Ref};

/// Lock operations for one principal, scoped to one branch (or the whole
/// repository).
pub struct LockCoordinator<'a> {
    client: Arc<dyn LfsClient>,
    branch: Option<&'a BranchRef>,
    reference: Option<Ref>,
}

impl<'a> LockCoordinator<'a> {
    pub fn new(client: Arc<dyn LfsClient>, branch: Option<&'a BranchRef>) -> Self {
        Self {
            client,
            reference: branch.map(Ref::from),
            branch,
        }
    }

    fn desc(&self, lock: Lock) -> LockDesc {
        lock.into_lock_desc(self.branch)
    }

    /// Lock every target in order.
    ///
    /// On conflict with `steal` set, the conflicting lock is force-released
    /// and the acquisition retried once; a second failure propagates.
    pub async fn lock(
        &self,
        comment: Option<&str>,
        steal: bool,
        targets: &[LockTarget],
    ) -> LfsResult<Vec<LockDesc>> {
        if let Some(comment) = comment {
            // The LFS locking API has nowhere to put a comment.
            debug!(comment, "ignoring lock comment");
        }

        let reference = self.reference.as_ref();
        let mut result = Vec::with_capacity(targets.len());
        for target in targets {
            let lock = match self.client.lock(&target.path, reference).await {
                Ok(lock) => lock,
                Err(LfsError::LockConflict { lock: held, .. }) if steal => {
                    warn!(path = %target.path, id = %held.id, "stealing lock");
                    self.client.unlock(&held.id, true, reference).await?;
                    self.client.lock(&target.path, reference).await?
                }
                Err(e) => return Err(e),
            };
            result.push(self.desc(lock));
        }
        Ok(result)
    }

    /// Release every target in order.
    ///
    /// A target without a token is resolved to the first listed lock, provided
    /// its path matches exactly; otherwise the target is skipped. Locks
    /// the server no longer knows are left out of the result.
    pub async fn unlock(
        &self,
        break_lock: bool,
        targets: &[UnlockTarget],
    ) -> LfsResult<Vec<LockDesc>> {
        let reference = self.reference.as_ref();
        let mut result = Vec::with_capacity(targets.len());
        for target in targets {
            let id = match &target.token {
                Some(token) => token.clone(),
                None => {
                    let listed = self
                        .client
                        .list_locks(Some(&target.path), None, reference)
                        .await?;
                    match listed
                        .into_iter()
                        .next()
                        .filter(|lock| lock.path == target.path)
                    {
                        Some(lock) => lock.id,
                        None => {
                            debug!(path = %target.path, "no lock to release");
                            continue;
                        }
                    }
                }
            };

            if let Some(lock) = self.client.unlock(&id, break_lock, reference).await? {
                result.push(self.desc(lock));
            }
        }
        Ok(result)
    }

    pub async fn locks(&self, path: Option<&str>, id: Option<&str>) -> LfsResult<Vec<LockDesc>> {
        let locks = self
            .client
            .list_locks(path, id, self.reference.as_ref())
            .await?;
        Ok(locks.into_iter().map(|lock| self.desc(lock)).collect())
    }

    pub async fn verify(&self) -> LfsResult<VerifyLocksResult> {
        let res = self.client.verify_locks(self.reference.as_ref()).await?;
        Ok(VerifyLocksResult {
            ours: res.ours.into_iter().map(|lock| self.desc(lock)).collect(),
            theirs: res.theirs.into_iter().map(|lock| self.desc(lock)).collect(),
        })
    }
}
