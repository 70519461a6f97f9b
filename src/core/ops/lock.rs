//! core::ops::lock
//!
//! Inter-process stamping lock.
//!
//! # Architecture
//!
//! The lock serializes stamping attempts of local processes working on the
//! same repository. It is held from before matching until publish (and any
//! retries) finishes. Races between machines are not covered here; those are
//! resolved by tag and push rejection in the publish protocol.
//!
//! # Storage
//!
//! - `<vcs dir>/vmn.lock` - lock file with an OS-level exclusive lock
//!
//! The file lives in the VCS metadata directory so it is never tracked.
//!
//! # Invariants
//!
//! - Lock is automatically released on drop (RAII pattern)
//! - [`RepoLock::wait`] blocks until the lock is free
//! - [`RepoLock::acquire`] fails fast with [`LockError::AlreadyLocked`]
//!
//! # Example
//!
//! ```no_run
//! use vmn::core::ops::lock::RepoLock;
//! use vmn::core::paths::VmnPaths;
//! use std::path::PathBuf;
//!
//! let paths = VmnPaths::new(PathBuf::from("/repo"), PathBuf::from("/repo/.git"));
//! let lock = RepoLock::wait(&paths).unwrap();
//!
//! // stamp while holding the lock
//!
//! drop(lock);
//! ```

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;
use tracing::debug;

use crate::core::paths::VmnPaths;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process already holds the lock.
    #[error("repository is locked by another vmn process")]
    AlreadyLocked,

    /// Failed to create the lock file.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),
}

/// An exclusive lock on the repository's stamping state.
///
/// Released when dropped, including on panic unwinding.
#[derive(Debug)]
pub struct RepoLock {
    path: PathBuf,
    /// When this is Some, we hold the lock.
    file: Option<File>,
}

impl RepoLock {
    /// Acquire the lock without blocking.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another process holds the lock
    /// - [`LockError::CreateFailed`] if the lock file cannot be opened
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be acquired
    pub fn acquire(paths: &VmnPaths) -> Result<Self, LockError> {
        let (path, file) = Self::open(paths)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                path,
                file: Some(file),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(LockError::AlreadyLocked),
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    /// Acquire the lock, blocking until it becomes available.
    pub fn wait(paths: &VmnPaths) -> Result<Self, LockError> {
        let (path, file) = Self::open(paths)?;

        debug!(path = %path.display(), "waiting for stamping lock");
        file.lock_exclusive()
            .map_err(|e| LockError::AcquireFailed(e.to_string()))?;

        Ok(Self {
            path,
            file: Some(file),
        })
    }

    /// Try to acquire the lock, returning None if already held.
    pub fn try_acquire(paths: &VmnPaths) -> Result<Option<Self>, LockError> {
        match Self::acquire(paths) {
            Ok(lock) => Ok(Some(lock)),
            Err(LockError::AlreadyLocked) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn open(paths: &VmnPaths) -> Result<(PathBuf, File), LockError> {
        let path = paths.lock_path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;
        Ok((path, file))
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock before the guard goes out of scope.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            file.unlock()
                .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_paths(temp: &TempDir) -> VmnPaths {
        let vcs_dir = temp.path().join(".git");
        std::fs::create_dir_all(&vcs_dir).unwrap();
        VmnPaths::new(temp.path().to_path_buf(), vcs_dir)
    }

    #[test]
    fn lock_acquire_succeeds() {
        let temp = TempDir::new().unwrap();
        let paths = test_paths(&temp);

        let lock = RepoLock::acquire(&paths).expect("acquire lock");
        assert!(lock.is_held());
        assert_eq!(lock.path(), paths.lock_path());
        assert!(lock.path().exists());
    }

    #[test]
    fn lock_prevents_second_acquire() {
        let temp = TempDir::new().unwrap();
        let paths = test_paths(&temp);

        let _lock = RepoLock::acquire(&paths).expect("first acquire");
        assert!(matches!(
            RepoLock::acquire(&paths),
            Err(LockError::AlreadyLocked)
        ));
        assert!(RepoLock::try_acquire(&paths).unwrap().is_none());
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = TempDir::new().unwrap();
        let paths = test_paths(&temp);

        {
            let _lock = RepoLock::acquire(&paths).expect("first acquire");
        }

        assert!(RepoLock::acquire(&paths).is_ok());
    }

    #[test]
    fn multiple_release_calls_are_safe() {
        let temp = TempDir::new().unwrap();
        let paths = test_paths(&temp);

        let mut lock = RepoLock::acquire(&paths).expect("acquire");
        lock.release().expect("first release");
        lock.release().expect("second release");
        assert!(!lock.is_held());
    }

    #[test]
    fn wait_blocks_until_released() {
        let temp = TempDir::new().unwrap();
        let paths = test_paths(&temp);

        let mut held = RepoLock::acquire(&paths).expect("acquire");

        let (tx, rx) = mpsc::channel();
        let waiter_paths = paths.clone();
        let waiter = thread::spawn(move || {
            let lock = RepoLock::wait(&waiter_paths).expect("wait");
            tx.send(()).unwrap();
            drop(lock);
        });

        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        held.release().unwrap();
        rx.recv_timeout(Duration::from_secs(5))
            .expect("waiter should get the lock after release");
        waiter.join().unwrap();
    }

    #[test]
    fn missing_vcs_dir_fails_to_create() {
        let temp = TempDir::new().unwrap();
        let paths = VmnPaths::new(temp.path().to_path_buf(), temp.path().join("absent"));
        assert!(matches!(
            RepoLock::acquire(&paths),
            Err(LockError::CreateFailed(_))
        ));
    }
}
