//! Lock manager: per-file advisory exclusive locks with a bounded wait.
//!
//! The lock is taken on a sidecar `<file>.lock` rather than on the collection
//! file itself. Collection files are replaced by rename on every commit, so a
//! lock held on the old inode would not exclude a process that opens the new
//! one. The sidecar is never renamed or deleted, so every participant locks
//! the same inode.
//!
//! Locks come from `fs2` (`flock` on Unix, `LockFileEx` on Windows). They are
//! per open file description, which means two handles in the same process
//! exclude each other just like two processes do.

use crate::error::{Result, VaultError};
use crate::{log_error, log_info, log_trace, log_warn};
use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// Path of the sidecar lock file guarding `path`.
pub fn lock_path_for(path: &Path) -> PathBuf {
    let mut name: OsString = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}

/// Create `path` (empty) and its parent directory if they do not exist.
///
/// Uses `create_new`, so a concurrent bootstrap can never truncate content
/// another participant already wrote.
pub fn ensure_backing_file(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => {
            log_info!("Created empty collection file {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn is_contended(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::WouldBlock {
        return true;
    }
    let contended = fs2::lock_contended_error();
    err.raw_os_error().is_some() && err.raw_os_error() == contended.raw_os_error()
}

/// RAII handle for an exclusive lock on one collection file.
///
/// Released by [`FileLock::release`] or, on any other exit path, on drop.
#[derive(Debug)]
pub struct FileLock {
    file: Option<File>,
    path: PathBuf,
}

impl FileLock {
    /// Acquire the lock guarding `path`, polling every `poll_interval` until
    /// `timeout` has elapsed.
    ///
    /// A zero `timeout` makes exactly one attempt.
    ///
    /// # Errors
    ///
    /// - `VaultError::LockTimeout` if the deadline passes first
    /// - `VaultError::Io` if the backing or sidecar file cannot be created
    pub fn acquire(path: &Path, timeout: Duration, poll_interval: Duration) -> Result<Self> {
        ensure_backing_file(path)?;

        let lock_path = lock_path_for(path);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        let started = Instant::now();
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            match file.try_lock_exclusive() {
                Ok(()) => {
                    log_trace!(
                        "Locked {} after {} attempt(s), {:?}",
                        path.display(),
                        attempts,
                        started.elapsed()
                    );
                    return Ok(FileLock {
                        file: Some(file),
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if is_contended(&e) => {}
                Err(e) => return Err(e.into()),
            }

            let waited = started.elapsed();
            if waited >= timeout {
                log_warn!(
                    "Gave up on lock for {} after {:?} ({} attempts)",
                    path.display(),
                    waited,
                    attempts
                );
                return Err(VaultError::LockTimeout {
                    path: path.to_path_buf(),
                    waited,
                });
            }

            thread::sleep(poll_interval.min(timeout - waited));
        }
    }

    /// Single non-blocking attempt. `Ok(None)` when someone else holds it.
    pub fn try_acquire(path: &Path) -> Result<Option<Self>> {
        match Self::acquire(path, Duration::ZERO, Duration::from_millis(1)) {
            Ok(lock) => Ok(Some(lock)),
            Err(VaultError::LockTimeout { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// The collection file this lock guards
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release now and report failure, instead of the silent release on drop.
    pub fn release(mut self) -> Result<()> {
        match self.file.take() {
            Some(file) => FileExt::unlock(&file).map_err(VaultError::from),
            None => Ok(()),
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = FileExt::unlock(&file) {
                // Closing the descriptor below still drops the flock
                log_error!("Failed to unlock {}: {}", self.path.display(), e);
            }
        }
    }
}
