//! Host-wide lock around the window where a vault session exists on disk.
//!
//! The `bw` tool supports one authenticated session per host, so export
//! and restore runs for different accounts must not overlap.  On Unix the
//! lock is an exclusive `flock` on a file that is never deleted: the
//! kernel drops it when the holder exits, crashed or not, so there is no
//! stale-lock takeover.  Elsewhere the lock is a file created with
//! `create_new` and removed when the guard is dropped.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::deadline::Deadline;
use crate::errors::{PortwardenError, Result};

/// Default lock file name inside the system temp directory.
pub const DEFAULT_LOCK_FILE: &str = "portwarden.lock";

const RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// A named cross-process lock.
#[derive(Debug, Clone)]
pub struct SessionLock {
    path: PathBuf,
}

/// Proof that the lock is held; releases it on drop.
#[derive(Debug)]
pub struct SessionGuard {
    file: File,
    path: PathBuf,
}

impl SessionLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Lock file in the system temp directory.
    pub fn default_path() -> PathBuf {
        std::env::temp_dir().join(DEFAULT_LOCK_FILE)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the lock if nobody holds it.
    pub fn try_acquire(&self) -> Result<Option<SessionGuard>> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let Some(mut file) = imp::try_lock(&self.path).map_err(|e| {
            PortwardenError::LockError(format!("cannot lock {}: {e}", self.path.display()))
        })?
        else {
            return Ok(None);
        };

        // Owner stamp for operators; never read back.
        let _ = file.set_len(0).and_then(|()| {
            writeln!(
                file,
                "pid={} acquired={}",
                std::process::id(),
                chrono::Utc::now().to_rfc3339()
            )
        });
        debug!(path = %self.path.display(), "session lock acquired");
        Ok(Some(SessionGuard {
            file,
            path: self.path.clone(),
        }))
    }

    /// Block until the lock is free or `deadline` passes.
    pub fn acquire(&self, deadline: &Deadline) -> Result<SessionGuard> {
        let mut announced = false;
        loop {
            if let Some(guard) = self.try_acquire()? {
                return Ok(guard);
            }
            if !announced {
                debug!(path = %self.path.display(), "waiting for session lock");
                announced = true;
            }
            deadline.sleep(RETRY_INTERVAL)?;
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        imp::unlock(&self.file, &self.path);
    }
}

#[cfg(unix)]
mod imp {
    use std::fs::{File, OpenOptions};
    use std::io;
    use std::os::unix::io::AsRawFd;
    use std::path::Path;

    use tracing::warn;

    pub(super) fn try_lock(path: &Path) -> io::Result<Option<File>> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        // SAFETY: `file` owns a valid descriptor for the duration of the call.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc == 0 {
            return Ok(Some(file));
        }
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::WouldBlock {
            Ok(None)
        } else {
            Err(err)
        }
    }

    pub(super) fn unlock(file: &File, path: &Path) {
        // SAFETY: as above; closing the file would release the lock too.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) };
        if rc != 0 {
            let err = io::Error::last_os_error();
            warn!(path = %path.display(), error = %err, "failed to release session lock");
        }
    }
}

#[cfg(not(unix))]
mod imp {
    use std::fs::{self, File, OpenOptions};
    use std::io;
    use std::path::Path;

    use tracing::warn;

    pub(super) fn try_lock(path: &Path) -> io::Result<Option<File>> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub(super) fn unlock(_file: &File, path: &Path) {
        if let Err(e) = fs::remove_file(path) {
            warn!(path = %path.display(), error = %e, "failed to release session lock");
        }
    }
}
