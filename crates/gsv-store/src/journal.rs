use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::{CacheValue, MetadataStore};

/// Flush/sync strategy for the journal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    /// `fsync` after every write (safest, highest latency).
    EveryWrite,
    /// Rely on OS page-cache buffering (fastest, least durable).
    #[default]
    OsDefault,
}

/// Configuration for [`JournalMetadataStore`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct JournalConfig {
    pub sync_mode: SyncMode,
}

/// One durable cache entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct JournalEntry {
    table: String,
    key: String,
    value: CacheValue,
}

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

type Tables = HashMap<String, HashMap<String, CacheValue>>;

/// Durable metadata store backed by an append-only journal.
///
/// Because cache entries are never overwritten, the journal only ever grows
/// by one record per stored key and replaying it front-to-back rebuilds the
/// exact table contents.
///
/// On-disk record format:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized entry)]
/// ```
///
/// Records failing the CRC check are skipped on replay; a truncated tail
/// (torn write) ends the replay.
///
/// Lookups never wait on disk. Stores are serialized on the journal writer
/// and block the calling thread for the append (and the `fsync` under
/// [`SyncMode::EveryWrite`]); async callers storing many entries with
/// `EveryWrite` should do so from `tokio::task::spawn_blocking`.
pub struct JournalMetadataStore {
    path: PathBuf,
    tables: RwLock<Tables>,
    writer: Mutex<BufWriter<File>>,
    config: JournalConfig,
}

impl JournalMetadataStore {
    /// Open (or create) a journal at `path` and replay it.
    pub fn open(path: &Path, config: JournalConfig) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        let (tables, valid_len) = replay(path)?;
        let file_len = file.metadata()?.len();
        if valid_len < file_len {
            warn!(valid_len, file_len, "dropping torn journal tail");
            file.set_len(valid_len)?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            tables: RwLock::new(tables),
            writer: Mutex::new(BufWriter::new(file)),
            config,
        })
    }

    /// Path to the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total number of entries across all tables.
    pub fn len(&self) -> usize {
        self.tables
            .read()
            .expect("lock poisoned")
            .values()
            .map(HashMap::len)
            .sum()
    }

    /// Returns `true` if no entry has been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, table: &str, key: &str) -> Option<CacheValue> {
        let tables = self.tables.read().expect("lock poisoned");
        tables.get(table).and_then(|t| t.get(key)).cloned()
    }

    fn append(
        w: &mut BufWriter<File>,
        entry: &JournalEntry,
        sync_mode: &SyncMode,
    ) -> StoreResult<()> {
        let payload =
            bincode::serialize(entry).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let length = payload.len() as u32;
        let crc = crc32fast::hash(&payload);

        w.write_all(&length.to_le_bytes())?;
        w.write_all(&crc.to_le_bytes())?;
        w.write_all(&payload)?;
        w.flush()?;
        if *sync_mode == SyncMode::EveryWrite {
            w.get_ref().sync_all()?;
        }

        debug!(table = %entry.table, key = %entry.key, "journal append");
        Ok(())
    }
}

impl MetadataStore for JournalMetadataStore {
    fn get(&self, table: &str, key: &str) -> StoreResult<Option<CacheValue>> {
        Ok(self.lookup(table, key))
    }

    fn put_if_absent(
        &self,
        table: &str,
        key: &str,
        value: CacheValue,
    ) -> StoreResult<Option<CacheValue>> {
        if let Some(previous) = self.lookup(table, key) {
            return Ok(Some(previous));
        }

        // The writer mutex orders stores; the tables lock is only taken
        // around memory updates, never across file I/O.
        let mut writer = self.writer.lock().expect("journal mutex poisoned");
        if let Some(previous) = self.lookup(table, key) {
            return Ok(Some(previous));
        }

        // Durable before visible: a failed append leaves the key absent.
        let entry = JournalEntry {
            table: table.to_string(),
            key: key.to_string(),
            value,
        };
        Self::append(&mut writer, &entry, &self.config.sync_mode)?;
        self.tables
            .write()
            .expect("lock poisoned")
            .entry(entry.table)
            .or_default()
            .insert(entry.key, entry.value);
        Ok(None)
    }
}

impl std::fmt::Debug for JournalMetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalMetadataStore")
            .field("path", &self.path)
            .field("entries", &self.len())
            .finish()
    }
}

/// Rebuild the tables from the journal. Also returns the length of the
/// readable prefix of the file.
fn replay(path: &Path) -> StoreResult<(Tables, u64)> {
    let mut file = BufReader::new(File::open(path)?);
    let file_len = file.get_ref().metadata()?.len();
    let mut tables = Tables::new();
    let mut offset: u64 = 0;
    let mut recovered = 0usize;

    loop {
        let mut header = [0u8; HEADER_SIZE];
        match file.read_exact(&mut header) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }

        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        if offset + HEADER_SIZE as u64 + length as u64 > file_len {
            warn!(offset, length, file_len, "journal record exceeds file; stopping replay");
            break;
        }

        let mut payload = vec![0u8; length as usize];
        match file.read_exact(&mut payload) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                warn!(offset, "truncated journal record; stopping replay");
                break;
            }
            Err(e) => return Err(e.into()),
        }
        let record_offset = offset;
        offset += HEADER_SIZE as u64 + length as u64;

        let actual_crc = crc32fast::hash(&payload);
        if actual_crc != expected_crc {
            warn!(
                offset = record_offset,
                expected = expected_crc,
                actual = actual_crc,
                "CRC mismatch; skipping journal record"
            );
            continue;
        }

        match bincode::deserialize::<JournalEntry>(&payload) {
            Ok(entry) => {
                // First record for a key wins, exactly like put_if_absent.
                tables
                    .entry(entry.table)
                    .or_default()
                    .entry(entry.key)
                    .or_insert(entry.value);
                recovered += 1;
            }
            Err(e) => {
                warn!(offset = record_offset, error = %e, "failed to decode journal record; skipping");
            }
        }
    }

    debug!(recovered, "journal replay complete");
    Ok((tables, offset))
}
