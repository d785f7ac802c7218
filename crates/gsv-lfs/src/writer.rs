use async_trait::async_trait;
use gsv_types::Principal;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{LfsError, LfsResult};
use crate::pointer::OID_PREFIX;
use crate::spill::{SpillBuffer, SpilledContent};
use crate::storage::RemoteStorage;

/// Buffered writer for a new large object.
#[async_trait]
pub trait LfsWriter: Send {
    async fn write(&mut self, data: &[u8]) -> LfsResult<()>;

    /// Bytes written so far.
    fn size(&self) -> u64;

    /// Commit the content and return its `sha256:`-prefixed oid. A writer
    /// can be finished only once.
    async fn finish(&mut self) -> LfsResult<String>;
}

/// Writer that buffers locally (spilling to disk past the threshold) and
/// uploads on [`finish`](LfsWriter::finish).
///
/// A failed upload keeps the finished content, so `finish` may be retried.
pub struct RemoteWriter {
    storage: RemoteStorage,
    principal: Principal,
    state: State,
}

enum State {
    Writing { buffer: SpillBuffer, hasher: Sha256 },
    Finished { content: SpilledContent, hash: String },
    Committed { size: u64 },
    Poisoned,
}

impl RemoteWriter {
    pub(crate) fn new(storage: RemoteStorage, principal: Principal, spill_threshold: usize) -> Self {
        Self {
            storage,
            principal,
            state: State::Writing {
                buffer: SpillBuffer::new(spill_threshold),
                hasher: Sha256::new(),
            },
        }
    }
}

#[async_trait]
impl LfsWriter for RemoteWriter {
    async fn write(&mut self, data: &[u8]) -> LfsResult<()> {
        match &mut self.state {
            State::Writing { buffer, hasher } => {
                buffer.write(data).await?;
                hasher.update(data);
                Ok(())
            }
            _ => Err(LfsError::WriterFinished),
        }
    }

    fn size(&self) -> u64 {
        match &self.state {
            State::Writing { buffer, .. } => buffer.len(),
            State::Finished { content, .. } => content.len(),
            State::Committed { size } => *size,
            State::Poisoned => 0,
        }
    }

    async fn finish(&mut self) -> LfsResult<String> {
        // A spill failure here loses the content; the writer stays poisoned.
        self.state = match std::mem::replace(&mut self.state, State::Poisoned) {
            State::Writing { buffer, hasher } => State::Finished {
                content: buffer.finish().await?,
                hash: hex::encode(hasher.finalize()),
            },
            other => other,
        };

        let State::Finished { content, hash } = &self.state else {
            return Err(LfsError::WriterFinished);
        };
        debug!(hash = %hash, size = content.len(), principal = %self.principal, "committing LFS object");
        self.storage
            .put_object(&self.principal, content, hash, content.len())
            .await?;

        let oid = format!("{OID_PREFIX}{hash}");
        let size = content.len();
        self.state = State::Committed { size };
        Ok(oid)
    }
}
