//! Directory scanner: rebuilds a domain's cache from its files.
//!
//! Used for both cold start and crash recovery. Tolerates what a crash can
//! plausibly leave behind (a missing directory, a truncated-to-blank file)
//! and refuses what it cannot explain (a file that fails to decode).

use std::fs;
use std::path::Path;

use crate::observability::Logger;

use super::errors::{DbError, DbResult};
use super::record::DiskRecord;

/// Reads every record file under `directory` and decodes it.
///
/// A missing directory is a fresh domain, not an error. The index file is
/// skipped by name wherever it appears; every other regular file is read in
/// full. Blank files are skipped with a trace note. A file whose non-blank
/// content fails to decode aborts the whole load with [`DbError::Decode`].
pub(crate) fn load_from_disk<T: DiskRecord>(
    directory: &Path,
    index_file_name: &str,
) -> DbResult<Vec<T>> {
    if !directory.exists() {
        Logger::trace(
            "DB_DIRECTORY_MISSING",
            &[("directory", &directory.display().to_string())],
        );
        return Ok(Vec::new());
    }

    let mut records = Vec::new();
    walk(directory, index_file_name, &mut records)?;
    Ok(records)
}

fn walk<T: DiskRecord>(dir: &Path, index_file_name: &str, out: &mut Vec<T>) -> DbResult<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            walk(&path, index_file_name, out)?;
            continue;
        }
        if !file_type.is_file() {
            continue;
        }
        if path.file_name().is_some_and(|name| name == index_file_name) {
            continue;
        }

        if let Some(record) = read_record_file(&path)? {
            out.push(record);
        }
    }
    Ok(())
}

fn read_record_file<T: DiskRecord>(path: &Path) -> DbResult<Option<T>> {
    let content = fs::read_to_string(path)?;

    if content.trim().is_empty() {
        // A partially written or truncated file from a prior crash
        Logger::trace(
            "DB_FILE_BLANK",
            &[("path", &path.display().to_string())],
        );
        return Ok(None);
    }

    match T::deserialize(&content) {
        Ok(record) => Ok(Some(record)),
        Err(failure) => Err(DbError::Decode {
            path: path.to_path_buf(),
            content,
            message: failure.to_string(),
        }),
    }
}
