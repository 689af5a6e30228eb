//! core::lock
//!
//! Exclusive lock on a host's staging tree.
//!
//! Composition assumes it is the only writer below the staging root for the
//! whole pipeline. The lock makes a second `mw install` against the same
//! host fail fast instead of interleaving symlink and manifest writes.
//!
//! # Storage
//!
//! - `<host dir>/<staging dir>.lock` - lock file with an OS-level exclusive lock
//!
//! # Invariants
//!
//! - Lock must be held for the entire staging pipeline
//! - Lock is automatically released on drop (RAII pattern)
//! - Lock acquisition is non-blocking (fails fast if locked)
//!
//! # Example
//!
//! ```no_run
//! use modweave::core::lock::StagingLock;
//! use modweave::core::paths::StagingPaths;
//! use std::path::PathBuf;
//!
//! let paths = StagingPaths::new(PathBuf::from("/work/host"), ".modweave");
//! let lock = StagingLock::acquire(&paths)?;
//!
//! // ... stage ...
//!
//! drop(lock);
//! # Ok::<(), modweave::core::lock::LockError>(())
//! ```

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

use crate::core::paths::StagingPaths;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process already holds the lock.
    #[error("staging tree is locked by another process ({0})")]
    AlreadyLocked(PathBuf),

    /// Failed to create lock file or directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),
}

/// An exclusive lock on a staging tree.
///
/// Released when dropped, even if the pipeline panics.
#[derive(Debug)]
pub struct StagingLock {
    path: PathBuf,
    file: Option<File>,
}

impl StagingLock {
    /// Attempt to acquire the staging lock.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another process holds the lock
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be acquired
    pub fn acquire(paths: &StagingPaths) -> Result<Self, LockError> {
        let path = paths.lock_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                LockError::CreateFailed(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                path,
                file: Some(file),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                Err(LockError::AlreadyLocked(path))
            }
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    /// Check if this guard still holds the lock.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock explicitly.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            FileExt::unlock(&file).map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for StagingLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = FileExt::unlock(&file);
        }
    }
}
