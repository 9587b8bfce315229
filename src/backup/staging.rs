//! Staging directory for one export or restore run.
//!
//! Layout (the archive is built from `root`, so every entry starts with
//! `portwarden_backup/`):
//!
//! ```text
//! <work_dir>/.portwarden-<pid>-<nanos>-<n>/        <- root
//!     portwarden_backup/
//!         folders.json
//!         items.json
//!         <item name>/<attachment file>
//! ```
//!
//! The directory holds plaintext vault data, so it is removed when the
//! guard is dropped, on success and on every error path.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

use crate::errors::Result;
use crate::vault::ItemRecord;

/// Top-level directory inside every archive.
pub const BACKUP_FOLDER_NAME: &str = "portwarden_backup";

/// Folder manifest file name.
pub const FOLDERS_JSON: &str = "folders.json";

/// Item manifest file name.
pub const ITEMS_JSON: &str = "items.json";

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// A freshly created staging directory, deleted on drop.
#[derive(Debug)]
pub struct StagingDir {
    root: PathBuf,
    removed: bool,
}

impl StagingDir {
    /// Create a new, uniquely named staging directory under `work_dir`.
    pub fn create(work_dir: &Path) -> Result<Self> {
        let name = format!(
            ".portwarden-{}-{}-{}",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0),
            SEQUENCE.fetch_add(1, Ordering::Relaxed)
        );
        let root = work_dir.join(name);
        create_private_dir(&root)?;
        let staging = Self {
            root,
            removed: false,
        };
        fs::create_dir_all(staging.backup_dir())?;
        Ok(staging)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/portwarden_backup`
    pub fn backup_dir(&self) -> PathBuf {
        self.root.join(BACKUP_FOLDER_NAME)
    }

    pub fn folders_json(&self) -> PathBuf {
        self.backup_dir().join(FOLDERS_JSON)
    }

    pub fn items_json(&self) -> PathBuf {
        self.backup_dir().join(ITEMS_JSON)
    }

    /// Directory holding `item`'s attachment files.
    pub fn attachment_dir(&self, item: &ItemRecord) -> PathBuf {
        self.backup_dir().join(item.attachment_dir_name())
    }

    /// Delete the directory now, reporting any failure.
    pub fn remove(mut self) -> Result<()> {
        self.removed = true;
        remove_tree(&self.root)
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = remove_tree(&self.root) {
            warn!(path = %self.root.display(), error = %e, "failed to remove staging directory");
        }
    }
}

fn remove_tree(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn create_private_dir(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(path)?;
    }
    #[cfg(not(unix))]
    fs::create_dir_all(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn create_builds_backup_dir() {
        let work = TempDir::new().unwrap();
        let staging = StagingDir::create(work.path()).unwrap();
        assert!(staging.backup_dir().is_dir());
        assert!(staging.folders_json().ends_with("portwarden_backup/folders.json"));
        assert!(staging.items_json().ends_with("portwarden_backup/items.json"));
    }

    #[test]
    fn names_are_unique() {
        let work = TempDir::new().unwrap();
        let a = StagingDir::create(work.path()).unwrap();
        let b = StagingDir::create(work.path()).unwrap();
        assert_ne!(a.root(), b.root());
    }

    #[test]
    fn drop_removes_everything() {
        let work = TempDir::new().unwrap();
        let root = {
            let staging = StagingDir::create(work.path()).unwrap();
            fs::write(staging.items_json(), b"[]").unwrap();
            staging.root().to_path_buf()
        };
        assert!(!root.exists());
    }

    #[test]
    fn remove_is_explicit_and_idempotent() {
        let work = TempDir::new().unwrap();
        let staging = StagingDir::create(work.path()).unwrap();
        let root = staging.root().to_path_buf();
        fs::remove_dir_all(&root).unwrap();
        staging.remove().unwrap();
        assert!(!root.exists());
    }
}
