//! Atomic read-modify-write against one file.
//!
//! Every transaction runs a single critical section:
//!
//! ```text
//! lock ─► read ─► decode ─► f(&mut value) ─┬─ Err ──────────────► unlock, Err
//!                                          ├─ Skip ─────────────► unlock, Ok
//!                                          └─ Write ─► encode ─► temp + fsync + rename ─► unlock, Ok
//! ```
//!
//! The lock is held from before the read until after the rename. Reading and
//! writing under two separate acquisitions would let another writer slip in
//! between and its update would be lost.
//!
//! Transactions on different files never wait for each other.

use crate::codec::{self, Stored};
use crate::config::StoreConfig;
use crate::error::Result;
use crate::lock::FileLock;
use crate::record::Record;
use crate::{log_debug, log_error, log_warn};
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// What the transaction body wants done with the (possibly mutated) value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Commit<T> {
    /// Persist the value, then return `T`
    Write(T),
    /// Leave the file untouched, then return `T`. Mutations are discarded.
    Skip(T),
}

impl<T> Commit<T> {
    pub fn into_inner(self) -> T {
        match self {
            Commit::Write(v) | Commit::Skip(v) => v,
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self, Commit::Write(_))
    }
}

/// Run `f` against the decoded content of `path` inside the file's lock.
///
/// - `f` returning `Err` aborts: nothing is written and the error propagates.
/// - `Commit::Write` replaces the file atomically with the encoded value.
/// - The lock is released on every path out of this function, including
///   panics inside `f`.
pub fn with_stored<S, T, F>(path: &Path, config: &StoreConfig, f: F) -> Result<T>
where
    S: Stored,
    F: FnOnce(&mut S) -> Result<Commit<T>>,
{
    let lock = FileLock::acquire(path, config.lock_timeout, config.poll_interval)?;

    let bytes = read_all(path)?;
    let mut value: S = codec::decode(&bytes, path, config.decode_policy)?;

    let outcome = match f(&mut value) {
        Ok(outcome) => outcome,
        Err(e) => {
            log_debug!("Aborted transaction on {}: {}", path.display(), e);
            return Err(e);
        }
    };

    let result = match outcome {
        Commit::Write(out) => {
            let encoded = codec::encode(&value)?;
            atomic_replace(path, &encoded)?;
            log_debug!("Committed {} bytes to {}", encoded.len(), path.display());
            out
        }
        Commit::Skip(out) => out,
    };

    if let Err(e) = lock.release() {
        // Data is already durable; closing the handle drops the lock anyway
        log_error!("Unlock after commit failed on {}: {}", path.display(), e);
    }

    Ok(result)
}

/// [`with_stored`] specialised to an ordered record collection.
pub fn with_collection<T, F>(path: &Path, config: &StoreConfig, f: F) -> Result<T>
where
    F: FnOnce(&mut Vec<Record>) -> Result<Commit<T>>,
{
    with_stored::<Vec<Record>, T, F>(path, config, f)
}

/// [`with_stored`] specialised to a singleton document.
pub fn with_document<T, F>(path: &Path, config: &StoreConfig, f: F) -> Result<T>
where
    F: FnOnce(&mut Option<Record>) -> Result<Commit<T>>,
{
    with_stored::<Option<Record>, T, F>(path, config, f)
}

fn read_all(path: &Path) -> Result<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e.into()),
    }
}

/// Replace `path` with `contents`: write a temp file in the same directory,
/// fsync it, rename it over the target. Readers see the old or the new
/// content, never a prefix.
pub fn atomic_replace(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.flush()?;

    // Keep the mode of the file being replaced instead of the temp file's 0600
    if let Ok(meta) = fs::metadata(path) {
        tmp.as_file().set_permissions(meta.permissions())?;
    }
    tmp.as_file().sync_all()?;

    tmp.persist(path).map_err(|e| e.error)?;

    // The new content is already in place; only the rename's durability is at stake
    if let Err(e) = sync_dir(dir) {
        log_warn!("Directory fsync after replacing {} failed: {}", path.display(), e);
    }

    Ok(())
}

/// Make a rename inside `dir` durable
#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
