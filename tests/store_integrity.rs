//! Record Store Integrity Tests
//!
//! Covers the synchronous contract of the store:
//! - round-trip law for the disk codec
//! - identity monotonicity and uniqueness
//! - update-of-missing fails fast and leaves disk untouched
//! - enqueue order equals on-disk effect order after a full drain
//! - the end-to-end persist/delete/stream/stop scenario

use std::fs;

use shaledb::db::{DbError, DecodeFailure, DiskRecord, RecordStore, DB_FILE_SUFFIX};
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct Task {
    index: u64,
    label: String,
}

impl Task {
    fn new(label: &str) -> Self {
        Self {
            index: 0,
            label: label.to_string(),
        }
    }
}

impl DiskRecord for Task {
    fn index(&self) -> u64 {
        self.index
    }

    fn set_index(&mut self, index: u64) {
        self.index = index;
    }

    fn serialize(&self) -> String {
        format!("{} {}", self.index, self.label)
    }

    fn deserialize(text: &str) -> Result<Self, DecodeFailure> {
        let (raw_index, label) = text
            .split_once(' ')
            .ok_or_else(|| DecodeFailure::new("expected \"<index> <label>\""))?;
        let index = raw_index
            .parse()
            .map_err(|_| DecodeFailure::new(format!("bad index {:?}", raw_index)))?;
        Ok(Self {
            index,
            label: label.to_string(),
        })
    }
}

fn open_store(dir: &TempDir) -> RecordStore<Task> {
    RecordStore::open(dir.path().join("tasks")).expect("store should open")
}

fn record_file_name(index: u64) -> String {
    format!("{}.{}", index, DB_FILE_SUFFIX)
}

// =============================================================================
// Round-trip law
// =============================================================================

#[test]
fn test_deserialize_is_left_inverse_of_serialize() {
    for label in ["plain", "with  double  spaces", "trailing space ", "a"] {
        let mut task = Task::new(label);
        task.set_index(99);
        assert_eq!(Task::deserialize(&task.serialize()).unwrap(), task);
    }
}

// =============================================================================
// Identity monotonicity
// =============================================================================

#[test]
fn test_assigned_indices_are_strictly_increasing_and_unique() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let mut assigned = Vec::new();
    for i in 0..25 {
        let task = store.persist(Task::new(&format!("task {}", i))).unwrap();
        assigned.push(task.index);
    }

    assert!(assigned.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(assigned.first(), Some(&1));
    assert_eq!(assigned.last(), Some(&25));
    store.stop();
}

#[test]
fn test_concurrent_persists_never_share_an_index() {
    let dir = TempDir::new().unwrap();
    let store = std::sync::Arc::new(open_store(&dir));

    let mut handles = Vec::new();
    for t in 0..4 {
        let store = store.clone();
        handles.push(std::thread::spawn(move || {
            let mut mine = Vec::new();
            for i in 0..50 {
                let task = store
                    .persist(Task::new(&format!("thread {} task {}", t, i)))
                    .unwrap();
                mine.push(task.index);
            }
            mine
        }));
    }

    let mut all: Vec<u64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    all.sort_unstable();
    all.dedup();
    assert_eq!(all.len(), 200, "every persist must get a unique index");
    store.stop();
}

// =============================================================================
// Update-of-missing fails
// =============================================================================

#[test]
fn test_update_of_never_persisted_index_raises_not_found() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let mut phantom = Task::new("never persisted");
    phantom.set_index(13);
    let result = store.update(phantom);
    assert!(matches!(result, Err(DbError::NotFound { index: 13 })));

    // Nothing was enqueued, so after a drain the directory holds nothing
    // beyond what open scheduled (the directory itself).
    store.stop();
    let entries: Vec<_> = fs::read_dir(dir.path().join("tasks"))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert!(entries.is_empty(), "on-disk directory must be unchanged");
}

// =============================================================================
// Ordering
// =============================================================================

#[test]
fn test_writes_land_in_program_order() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let first = store.persist(Task::new("first")).unwrap();
    let mut edited = first.clone();
    edited.label = "first, edited".to_string();
    store.update(edited.clone()).unwrap();
    store.stop();

    // The overwrite enqueued after the original write is what's on disk.
    let domain = dir.path().join("tasks");
    let content = fs::read_to_string(domain.join(record_file_name(first.index))).unwrap();
    assert_eq!(Task::deserialize(&content).unwrap(), edited);
}

#[test]
fn test_index_file_reflects_highest_written_after_drain() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    for i in 0..5 {
        store.persist(Task::new(&format!("task {}", i))).unwrap();
    }
    store.stop();

    let index_content =
        fs::read_to_string(dir.path().join("tasks").join(format!("index.{}", DB_FILE_SUFFIX)))
            .unwrap();
    assert_eq!(index_content.trim(), "5");
}

// =============================================================================
// End-to-end scenario
// =============================================================================

#[test]
fn test_persist_delete_stream_stop_leaves_expected_directory() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    let r1 = store.persist(Task::new("r1")).unwrap();
    let r2 = store.persist(Task::new("r2")).unwrap();
    assert_eq!(r1.index, 1);
    assert_eq!(r2.index, 2);

    store.delete(&r1).unwrap();

    let snapshot = store.stream().unwrap();
    assert_eq!(snapshot, vec![r2.clone()]);

    store.stop();

    let domain = dir.path().join("tasks");
    let mut names: Vec<String> = fs::read_dir(&domain)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec![record_file_name(2), format!("index.{}", DB_FILE_SUFFIX)]);

    let index_content = fs::read_to_string(domain.join(format!("index.{}", DB_FILE_SUFFIX))).unwrap();
    assert_eq!(index_content.trim(), "2");
}
