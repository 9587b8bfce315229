//! The backup pipelines and their supporting pieces.
//!
//! - `export` — vault → encrypted `.portwarden` backup
//! - `restore` — encrypted backup → empty vault
//! - `staging` — self-removing staging directory
//! - `archive` — zip / unzip of the staging tree
//! - `throttle` — pause policy between vault calls
//! - `lock` — host-wide lock serializing vault sessions

pub mod archive;
pub mod export;
pub mod lock;
pub mod restore;
pub mod staging;
pub mod throttle;

use std::path::PathBuf;

use crate::deadline::Deadline;

pub use export::{create_backup_file, decrypt_backup_file, export, export_with_session_data};
pub use lock::{SessionGuard, SessionLock};
pub use restore::{restore, restore_backup_file, RestoreReport, SkippedItem};
pub use throttle::Throttle;

/// Settings shared by one export or restore run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Pause between successive vault calls.
    pub throttle: Throttle,
    /// Overall deadline for the run.
    pub deadline: Deadline,
    /// Directory the staging directory is created in.
    pub work_dir: PathBuf,
}

impl RunOptions {
    /// No throttling and no deadline, staging under `work_dir`.
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            throttle: Throttle::none(),
            deadline: Deadline::none(),
            work_dir: work_dir.into(),
        }
    }

    pub fn with_throttle(mut self, throttle: Throttle) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }
}
