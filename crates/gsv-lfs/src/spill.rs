//! Bounded-memory buffering of transfer bodies.
//!
//! Content is held in memory until it grows past a threshold, then moved to
//! an anonymous temporary file. Either way the result can be re-read any
//! number of times, which upload retries and stream providers rely on.

use std::io::{self, Cursor, SeekFrom};
use std::sync::Arc;

use async_trait::async_trait;
use gsv_store::ObjectStream;
use tempfile::NamedTempFile;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tracing::debug;

use crate::transport::StreamProvider;

enum Sink {
    Memory(Vec<u8>),
    File { temp: NamedTempFile, writer: File },
}

/// Write side of a spillable buffer.
pub struct SpillBuffer {
    sink: Sink,
    threshold: usize,
    len: u64,
}

impl SpillBuffer {
    pub fn new(threshold: usize) -> Self {
        Self {
            sink: Sink::Memory(Vec::new()),
            threshold,
            len: 0,
        }
    }

    pub async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        if let Sink::Memory(buf) = &mut self.sink {
            if buf.len() + data.len() <= self.threshold {
                buf.extend_from_slice(data);
                self.len += data.len() as u64;
                return Ok(());
            }
            let temp = NamedTempFile::new()?;
            let mut writer = File::from_std(temp.as_file().try_clone()?);
            writer.write_all(buf).await?;
            debug!(path = %temp.path().display(), buffered = buf.len(), "spilling to temporary file");
            self.sink = Sink::File { temp, writer };
        }
        if let Sink::File { writer, .. } = &mut self.sink {
            writer.write_all(data).await?;
        }
        self.len += data.len() as u64;
        Ok(())
    }

    /// Bytes written so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_spilled(&self) -> bool {
        matches!(self.sink, Sink::File { .. })
    }

    pub async fn finish(self) -> io::Result<SpilledContent> {
        match self.sink {
            Sink::Memory(buf) => Ok(SpilledContent::Memory(buf.into())),
            Sink::File { temp, mut writer } => {
                writer.flush().await?;
                writer.sync_data().await?;
                Ok(SpilledContent::File {
                    temp,
                    len: self.len,
                })
            }
        }
    }
}

/// Finished, re-readable content of a [`SpillBuffer`].
pub enum SpilledContent {
    Memory(Arc<[u8]>),
    File { temp: NamedTempFile, len: u64 },
}

impl SpilledContent {
    pub fn len(&self) -> u64 {
        match self {
            Self::Memory(data) => data.len() as u64,
            Self::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open a fresh stream from the start of the content.
    pub fn open(&self) -> io::Result<ObjectStream> {
        match self {
            Self::Memory(data) => Ok(Box::new(Cursor::new(data.clone()))),
            Self::File { temp, .. } => Ok(Box::new(File::from_std(temp.reopen()?))),
        }
    }

    /// Consume into a single stream. A spilled file is unlinked right away
    /// and lives on only as long as the returned stream.
    pub async fn into_stream(self) -> io::Result<ObjectStream> {
        match self {
            Self::Memory(data) => Ok(Box::new(Cursor::new(data))),
            Self::File { temp, .. } => {
                let mut file = File::from_std(temp.into_file());
                file.seek(SeekFrom::Start(0)).await?;
                Ok(Box::new(file))
            }
        }
    }
}

#[async_trait]
impl StreamProvider for SpilledContent {
    async fn open_stream(&self) -> io::Result<ObjectStream> {
        self.open()
    }
}
