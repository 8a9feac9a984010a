//! Append-only transaction journal with CRC32 checksums
//!
//! File layout:
//! - 16 byte header: `[magic: u32][version: u32][reserved: u64]`
//! - entries: `[length: u32][crc: u32][bincode StoredTransaction]`
//!
//! All integers are little endian. A short final entry (a write torn by a
//! crash) is truncated away on open; a checksum mismatch is corruption.
//!
//! File I/O is blocking and runs on tokio's blocking pool. A failed append is
//! rolled back to the last complete entry; if that fails too the store stops
//! accepting writes.

use super::{StoredTransaction, TransactionStore};
use crate::error::{StatsError, StatsResult};
use async_trait::async_trait;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use services_common::{TransactionId, TransactionRecord};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// Size of journal header in bytes
const JOURNAL_HEADER_SIZE: u64 = 16;

/// Size of the per-entry frame header in bytes
const ENTRY_HEADER_SIZE: u64 = 8;

/// Magic number for journal files
const JOURNAL_MAGIC: u32 = 0x5458_4A4C; // "TXJL" in hex

/// Version of journal format
const JOURNAL_VERSION: u32 = 1;

/// Result of scanning a journal file
#[derive(Debug)]
struct JournalScan {
    entries: Vec<StoredTransaction>,
    /// Byte length of the valid prefix
    valid_len: u64,
    /// Whether bytes past `valid_len` belong to a torn entry
    torn_tail: bool,
}

/// Writer buffer size
const WRITER_CAPACITY: usize = 64 * 1024;

struct JournalInner {
    path: PathBuf,
    writer: BufWriter<File>,
    ids: FxHashSet<TransactionId>,
    next_sequence: u64,
    /// Byte length of the complete entries on disk
    valid_len: u64,
    /// Set when a failed write could not be rolled back
    failed: Option<String>,
}

/// Durable transaction store backed by a single journal file
pub struct JournalTransactionStore {
    path: PathBuf,
    inner: Arc<Mutex<JournalInner>>,
}

impl std::fmt::Debug for JournalTransactionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalTransactionStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl JournalTransactionStore {
    /// Open the journal at `path`, creating it if absent
    ///
    /// Rebuilds the id index from the existing entries and truncates a torn
    /// final entry.
    pub fn open(path: &Path) -> StatsResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let is_new = fs::metadata(path).map_or(true, |meta| meta.len() == 0);
        if is_new {
            Self::create(path)?;
        }

        let scan = Self::scan(path)?;
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        if scan.torn_tail {
            warn!(
                "Truncating torn journal tail at byte {} in {}",
                scan.valid_len,
                path.display()
            );
            file.set_len(scan.valid_len)?;
            file.sync_all()?;
        }

        let mut writer = BufWriter::with_capacity(WRITER_CAPACITY, file);
        writer.seek(SeekFrom::End(0))?;

        let ids = scan
            .entries
            .iter()
            .map(|entry| entry.record.transaction_id().clone())
            .collect();
        let next_sequence = scan.entries.last().map_or(0, |entry| entry.sequence + 1);

        info!(
            "Opened transaction journal {} with {} entries",
            path.display(),
            scan.entries.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            inner: Arc::new(Mutex::new(JournalInner {
                path: path.to_path_buf(),
                writer,
                ids,
                next_sequence,
                valid_len: scan.valid_len,
                failed: None,
            })),
        })
    }

    /// Journal file location
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn create(path: &Path) -> StatsResult<()> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_header(&mut writer)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        debug!("Created transaction journal {}", path.display());
        Ok(())
    }

    fn write_header<W: Write>(writer: &mut W) -> StatsResult<()> {
        writer.write_u32::<LittleEndian>(JOURNAL_MAGIC)?;
        writer.write_u32::<LittleEndian>(JOURNAL_VERSION)?;
        writer.write_u64::<LittleEndian>(0)?; // Reserved
        Ok(())
    }

    /// Read and validate every entry of the journal at `path`
    fn scan(path: &Path) -> StatsResult<JournalScan> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::with_capacity(64 * 1024, file);

        if file_len < JOURNAL_HEADER_SIZE {
            return Err(StatsError::JournalCorrupted {
                entry: 0,
                reason: format!("file is {file_len} bytes, shorter than the header"),
            });
        }

        let magic = reader.read_u32::<LittleEndian>()?;
        if magic != JOURNAL_MAGIC {
            return Err(StatsError::JournalCorrupted {
                entry: 0,
                reason: format!("invalid journal magic: {magic:#x}"),
            });
        }
        let version = reader.read_u32::<LittleEndian>()?;
        if version != JOURNAL_VERSION {
            return Err(StatsError::JournalCorrupted {
                entry: 0,
                reason: format!("unsupported journal version: {version}"),
            });
        }
        let _reserved = reader.read_u64::<LittleEndian>()?;

        let mut entries = Vec::new();
        let mut offset = JOURNAL_HEADER_SIZE;
        loop {
            let remaining = file_len - offset;
            if remaining == 0 {
                return Ok(JournalScan {
                    entries,
                    valid_len: offset,
                    torn_tail: false,
                });
            }
            if remaining < ENTRY_HEADER_SIZE {
                break;
            }

            let length = reader.read_u32::<LittleEndian>()?;
            let expected_crc = reader.read_u32::<LittleEndian>()?;
            if remaining - ENTRY_HEADER_SIZE < u64::from(length) {
                break;
            }

            // SAFETY: u32 to usize widening on 64-bit, identity on 32-bit
            let mut data = vec![0u8; length as usize];
            reader.read_exact(&mut data)?;

            let mut hasher = Hasher::new();
            hasher.update(&data);
            let actual_crc = hasher.finalize();
            let index = entries.len() as u64;
            if actual_crc != expected_crc {
                return Err(StatsError::JournalCorrupted {
                    entry: index,
                    reason: format!(
                        "CRC mismatch: expected {expected_crc:#x}, got {actual_crc:#x}"
                    ),
                });
            }

            let entry: StoredTransaction =
                bincode::deserialize(&data).map_err(|e| StatsError::JournalCorrupted {
                    entry: index,
                    reason: format!("undecodable entry: {e}"),
                })?;
            entries.push(entry);
            offset += ENTRY_HEADER_SIZE + u64::from(length);
        }

        Ok(JournalScan {
            entries,
            valid_len: offset,
            torn_tail: true,
        })
    }

    /// Run `op` against the locked journal on the blocking pool
    async fn with_inner<T, F>(&self, op: F) -> StatsResult<T>
    where
        F: FnOnce(&mut JournalInner) -> StatsResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || op(&mut inner.lock()))
            .await
            .map_err(|e| StatsError::JournalUnavailable {
                reason: format!("journal task failed: {e}"),
            })?
    }

    /// Write one frame, returning its size in bytes
    fn write_entry(writer: &mut BufWriter<File>, entry: &StoredTransaction) -> StatsResult<u64> {
        let data = bincode::serialize(entry)?;
        let length =
            u32::try_from(data.len()).map_err(|_| StatsError::RecordTooLarge { size: data.len() })?;

        let mut hasher = Hasher::new();
        hasher.update(&data);
        let crc = hasher.finalize();

        writer.write_u32::<LittleEndian>(length)?;
        writer.write_u32::<LittleEndian>(crc)?;
        writer.write_all(&data)?;
        writer.flush()?;
        writer.get_ref().sync_data()?;

        trace!(
            "Appended journal entry {} ({} bytes)",
            entry.sequence,
            data.len()
        );
        Ok(ENTRY_HEADER_SIZE + u64::from(length))
    }
}

impl JournalInner {
    fn ensure_writable(&self) -> StatsResult<()> {
        match &self.failed {
            Some(reason) => Err(StatsError::JournalUnavailable {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    fn append(&mut self, record: TransactionRecord) -> StatsResult<StoredTransaction> {
        self.ensure_writable()?;
        if self.ids.contains(record.transaction_id()) {
            return Err(StatsError::DuplicateTransaction {
                transaction_id: record.transaction_id().to_string(),
            });
        }

        let stored = StoredTransaction {
            sequence: self.next_sequence,
            record,
        };
        match JournalTransactionStore::write_entry(&mut self.writer, &stored) {
            Ok(frame_len) => self.valid_len += frame_len,
            Err(e) => {
                warn!("Journal append failed, rolling back: {}", e);
                self.roll_back();
                return Err(e);
            }
        }

        self.next_sequence += 1;
        self.ids.insert(stored.record.transaction_id().clone());
        Ok(stored)
    }

    /// Cut the file back to `valid_len` and start a clean writer there
    ///
    /// Bytes still buffered in the old writer are discarded, never flushed.
    fn roll_back(&mut self) {
        if let Err(e) = self.reset_writer() {
            error!(
                "Journal {} could not be rolled back, refusing further writes: {}",
                self.path.display(),
                e
            );
            self.failed = Some(format!("rollback after failed write failed: {e}"));
        }
    }

    fn reset_writer(&mut self) -> StatsResult<()> {
        let file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        let fresh = BufWriter::with_capacity(WRITER_CAPACITY, file);
        let (stale, _discarded) = std::mem::replace(&mut self.writer, fresh).into_parts();
        drop(stale);

        self.writer.get_ref().set_len(self.valid_len)?;
        self.writer.get_ref().sync_all()?;
        self.writer.seek(SeekFrom::End(0))?;
        Ok(())
    }

    fn clear(&mut self) -> StatsResult<u64> {
        self.ensure_writable()?;
        let removed = self.ids.len() as u64;

        self.writer.flush()?;
        self.writer.get_ref().set_len(JOURNAL_HEADER_SIZE)?;
        self.writer.get_ref().sync_all()?;
        self.writer.seek(SeekFrom::End(0))?;

        self.valid_len = JOURNAL_HEADER_SIZE;
        self.ids.clear();
        self.next_sequence = 0;
        info!(
            "Cleared {} entries from journal {}",
            removed,
            self.path.display()
        );
        Ok(removed)
    }

    fn load_all(&mut self) -> StatsResult<Vec<StoredTransaction>> {
        // The lock is held, so no append interleaves with the scan
        self.writer.flush()?;
        let scan = JournalTransactionStore::scan(&self.path)?;
        if scan.torn_tail {
            return Err(StatsError::JournalCorrupted {
                entry: scan.entries.len() as u64,
                reason: "incomplete entry behind the writer".to_string(),
            });
        }
        Ok(scan.entries)
    }
}

#[async_trait]
impl TransactionStore for JournalTransactionStore {
    async fn append(&self, record: TransactionRecord) -> StatsResult<StoredTransaction> {
        self.with_inner(move |inner| inner.append(record)).await
    }

    async fn clear(&self) -> StatsResult<u64> {
        self.with_inner(JournalInner::clear).await
    }

    async fn load_all(&self) -> StatsResult<Vec<StoredTransaction>> {
        self.with_inner(JournalInner::load_all).await
    }

    async fn len(&self) -> StatsResult<usize> {
        Ok(self.inner.lock().ids.len())
    }

    async fn contains(&self, transaction_id: &TransactionId) -> StatsResult<bool> {
        Ok(self.inner.lock().ids.contains(transaction_id))
    }
}
