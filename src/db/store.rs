//! The per-domain record store.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::observability::Logger;
use crate::queue::ActionQueue;

use super::errors::{DbError, DbResult};
use super::loader;
use super::record::{DiskRecord, DB_FILE_SUFFIX};

/// In-memory state behind the store's mutex: the authoritative record list
/// plus whether the initial directory scan has happened yet.
struct Cache<T> {
    records: Vec<T>,
    loaded: bool,
}

/// A disk-backed record store scoped to exactly one domain directory.
///
/// Callers on any thread may persist, update, delete, and stream
/// concurrently. Cache mutation and identity assignment happen synchronously
/// on the caller's thread under a short-lived lock; every disk mutation is
/// delegated to the store's own [`ActionQueue`], whose single worker is the
/// only code that writes this directory. Reads never touch disk after the
/// first load.
///
/// The directory has a single-writer-process precondition: a second process
/// pointed at the same directory will corrupt state.
pub struct RecordStore<T: DiskRecord> {
    directory: PathBuf,
    index_file: PathBuf,
    /// Next identity to assign.
    index: AtomicU64,
    cache: Mutex<Cache<T>>,
    queue: ActionQueue,
}

impl<T: DiskRecord> RecordStore<T> {
    /// Opens a store bound to `directory`.
    ///
    /// Reads only the persisted index file here; record files stay untouched
    /// until the first persist/update/delete/stream call triggers the lazy
    /// load. The index file records the highest index ever written, so the
    /// counter resumes one past it. Directory creation is the first action
    /// on the queue.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Decode`] if an index file exists but does not hold
    /// a decimal integer, or [`DbError::Io`] if it cannot be read or the
    /// worker thread cannot be spawned.
    pub fn open(directory: impl Into<PathBuf>) -> DbResult<Self> {
        let directory = directory.into();
        let index_file = directory.join(index_file_name());

        let next_index = if index_file.exists() {
            let content = fs::read_to_string(&index_file)?;
            let highest: u64 = content.trim().parse().map_err(|_| DbError::Decode {
                path: index_file.clone(),
                content: content.clone(),
                message: "expected a decimal record index".to_string(),
            })?;
            highest + 1
        } else {
            1
        };

        let queue = ActionQueue::start(format!("record-store-writer {}", directory.display()))
            .map_err(DbError::Io)?;

        let dir_to_create = directory.clone();
        queue.enqueue(
            format!("create directory {}", dir_to_create.display()),
            move || fs::create_dir_all(&dir_to_create),
        )?;

        Ok(Self {
            directory,
            index_file,
            index: AtomicU64::new(next_index),
            cache: Mutex::new(Cache {
                records: Vec::new(),
                loaded: false,
            }),
            queue,
        })
    }

    /// The domain directory this store owns.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Writes a record to the cache and schedules its disk write.
    ///
    /// An unidentified record (index 0) is assigned the next identity.
    /// Returns the identified record once the in-memory mutation is visible
    /// to subsequent reads; the file write and the index-file update are a
    /// single queued action behind all previously accepted actions.
    pub fn persist(&self, mut record: T) -> DbResult<T> {
        let mut cache = self.lock_cache();
        self.ensure_loaded(&mut cache)?;

        if record.index() == 0 {
            record.set_index(self.index.fetch_add(1, Ordering::SeqCst));
        } else {
            // A pre-identified record claims its index: the counter must
            // move past it, or a later assignment would hand out the same
            // identity to a second live record (and the same file path).
            self.index
                .fetch_max(record.index() + 1, Ordering::SeqCst);
        }
        cache.records.push(record.clone());

        // Enqueued before the lock is released, so identity order and disk
        // order agree across threads. Enqueue is a channel send, not I/O.
        let path = self.record_path(record.index());
        let index_file = self.index_file.clone();
        let text = record.serialize();
        let high_water = record
            .index()
            .max(self.index.load(Ordering::SeqCst).saturating_sub(1));
        self.queue
            .enqueue(format!("persist record {}", record.index()), move || {
                fs::write(&path, text)?;
                fs::write(&index_file, high_water.to_string())
            })?;

        Ok(record)
    }

    /// Replaces the cache entry with the same index and schedules an
    /// overwrite of its file.
    ///
    /// The queued action asserts the file still exists before writing, which
    /// guards against a racing delete; when the file is gone the queued
    /// write fails (logged by the worker, not retried) and the in-memory
    /// replacement is *not* rolled back.
    ///
    /// # Errors
    ///
    /// [`DbError::NotFound`] if no cache entry carries the record's index.
    /// Nothing is enqueued in that case and disk is untouched.
    pub fn update(&self, record: T) -> DbResult<()> {
        let mut cache = self.lock_cache();
        self.ensure_loaded(&mut cache)?;

        let position = cache
            .records
            .iter()
            .position(|existing| existing.index() == record.index())
            .ok_or(DbError::NotFound {
                index: record.index(),
            })?;
        cache.records[position] = record.clone();

        let path = self.record_path(record.index());
        let text = record.serialize();
        self.queue
            .enqueue(format!("update record {}", record.index()), move || {
                if !path.exists() {
                    return Err(io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("asked to update {} but it does not exist", path.display()),
                    ));
                }
                fs::write(&path, text)
            })?;

        Ok(())
    }

    /// Removes the matching cache entry and schedules removal of its file.
    ///
    /// A record absent from the cache is tolerated (trace-logged); the file
    /// removal is still enqueued, and a file already missing when the action
    /// runs is logged by the worker, not escalated.
    ///
    /// When the cache becomes empty the identity counter resets to 1. That
    /// policy is preserved from the original design and carries a known
    /// hazard: a write still queued for a freshly deleted index can race a
    /// re-created file. Domains that empty themselves should drain with
    /// [`RecordStore::stop`] before reusing identities.
    pub fn delete(&self, record: &T) -> DbResult<()> {
        let mut cache = self.lock_cache();
        self.ensure_loaded(&mut cache)?;

        let before = cache.records.len();
        cache
            .records
            .retain(|existing| existing.index() != record.index());
        if cache.records.len() == before {
            Logger::trace(
                "DB_DELETE_NOT_IN_CACHE",
                &[
                    ("directory", &self.directory.display().to_string()),
                    ("index", &record.index().to_string()),
                ],
            );
        }

        if cache.records.is_empty() {
            self.index.store(1, Ordering::SeqCst);
            Logger::trace(
                "DB_INDEX_RESET",
                &[("directory", &self.directory.display().to_string())],
            );
        }

        let path = self.record_path(record.index());
        self.queue
            .enqueue(format!("delete record {}", record.index()), move || {
                fs::remove_file(&path)
            })?;

        Ok(())
    }

    /// Returns a read-only snapshot of the current cache.
    ///
    /// The first accessor call on a store triggers the directory scan,
    /// exactly once, synchronously; every later call is a cache clone. The
    /// snapshot is restartable and decoupled from later mutations.
    pub fn stream(&self) -> DbResult<Vec<T>> {
        let mut cache = self.lock_cache();
        self.ensure_loaded(&mut cache)?;
        Ok(cache.records.clone())
    }

    /// Stops the store after a full drain of its queued disk writes.
    pub fn stop(&self) {
        self.queue.stop();
    }

    /// Stops the store, waiting at most `max_wait_count * per_wait_millis`
    /// for queued writes to drain before abandoning the remainder. See
    /// [`ActionQueue::stop_within`] for the data-loss trade-off.
    pub fn stop_within(&self, max_wait_count: u32, per_wait_millis: u64) {
        self.queue.stop_within(max_wait_count, per_wait_millis);
    }

    /// Number of accepted disk actions not yet applied.
    pub fn pending_writes(&self) -> usize {
        self.queue.pending()
    }

    fn ensure_loaded(&self, cache: &mut MutexGuard<'_, Cache<T>>) -> DbResult<()> {
        if cache.loaded {
            return Ok(());
        }

        cache.records = loader::load_from_disk(&self.directory, &index_file_name())?;
        cache.loaded = true;

        // The index file can lag the record files if a crash landed between
        // the two writes of a persist action. Never resume below what is
        // actually on disk.
        if let Some(max_on_disk) = cache.records.iter().map(DiskRecord::index).max() {
            let floor = max_on_disk + 1;
            if self.index.load(Ordering::SeqCst) < floor {
                self.index.store(floor, Ordering::SeqCst);
            }
        }
        Ok(())
    }

    /// The record's file path is fully determined by its index.
    fn record_path(&self, index: u64) -> PathBuf {
        self.directory.join(format!("{}.{}", index, DB_FILE_SUFFIX))
    }

    fn lock_cache(&self) -> MutexGuard<'_, Cache<T>> {
        // A poisoning panic can only come from a caller's Clone/serialize
        // impl; the cache itself is still structurally sound, so keep going.
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn index_file_name() -> String {
    format!("index.{}", DB_FILE_SUFFIX)
}
