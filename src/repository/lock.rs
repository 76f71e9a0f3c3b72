//! # Repository Lock
//!
//! Cross-process advisory lock guarding read-modify-write of the shared
//! repository file. Backed by `flock(2)` on a companion `.lock` file, so it
//! excludes other operator processes on the same host as well as other
//! handles opened inside this process.

use crate::repository::RepositoryError;
use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

/// Exclusive lock guard; released on drop
#[derive(Debug)]
pub struct RepositoryLock {
    file: File,
    path: PathBuf,
}

impl RepositoryLock {
    /// Companion lock file for a repository file: same path, `.lock` extension
    #[must_use]
    pub fn lock_path_for(repository_file: &Path) -> PathBuf {
        repository_file.with_extension("lock")
    }

    /// Acquire the lock, polling until `timeout` elapses
    ///
    /// # Errors
    ///
    /// Returns `RepositoryLockTimeout` when the lock is still held by someone
    /// else at the deadline, or `Io` if the lock file cannot be opened.
    pub async fn acquire(
        lock_path: &Path,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self, RepositoryError> {
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| RepositoryError::io(parent, e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(lock_path)
            .map_err(|e| RepositoryError::io(lock_path, e))?;

        let deadline = Instant::now() + timeout;
        loop {
            if try_lock_exclusive(&file).map_err(|e| RepositoryError::io(lock_path, e))? {
                debug!("Acquired repository lock {}", lock_path.display());
                return Ok(Self {
                    file,
                    path: lock_path.to_path_buf(),
                });
            }

            if Instant::now() >= deadline {
                crate::observability::metrics::increment_repository_lock_timeouts();
                return Err(RepositoryError::RepositoryLockTimeout {
                    path: lock_path.to_path_buf(),
                    timeout,
                });
            }

            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Path of the lock file held by this guard
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RepositoryLock {
    fn drop(&mut self) {
        // The lock file itself stays on disk: unlinking it would let a waiter
        // lock an orphaned inode while a newcomer locks a fresh file.
        // SAFETY: the descriptor is owned by `self.file` and open for the
        // lifetime of this guard.
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
        debug!("Released repository lock {}", self.path.display());
    }
}

/// Non-blocking exclusive `flock`; `Ok(false)` when another holder has it
fn try_lock_exclusive(file: &File) -> std::io::Result<bool> {
    // SAFETY: `file` is a valid open descriptor for the duration of the call.
    let ret = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if ret == 0 {
        return Ok(true);
    }
    let err = std::io::Error::last_os_error();
    if err.kind() == std::io::ErrorKind::WouldBlock {
        Ok(false)
    } else {
        Err(err)
    }
}
