//! The `bw` tool's `data.json` session file.
//!
//! After a login the tool keeps its account state in
//! `<BITWARDENCLI_APPDATA_DIR>/data.json`.  A hosted worker captures that
//! file right after login (and deletes it), then installs it again only
//! for the duration of one export.  While it exists on disk, any `bw`
//! invocation on the host acts as that account, which is why installs are
//! serialized by `backup::lock::SessionLock`.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::errors::Result;

/// File name `bw` stores its account state under.
pub const DATA_JSON: &str = "data.json";

/// `data.json` installed into an app-data directory; removed on drop.
#[derive(Debug)]
pub struct SessionDataFile {
    path: PathBuf,
}

impl SessionDataFile {
    /// Write `contents` as `<appdata_dir>/data.json`.
    pub fn install(appdata_dir: &Path, contents: &[u8]) -> Result<Self> {
        fs::create_dir_all(appdata_dir)?;
        let path = appdata_dir.join(DATA_JSON);
        write_private(&path, contents)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SessionDataFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to remove session data file");
            }
        }
    }
}

/// Read and delete `<appdata_dir>/data.json` left behind by a login.
pub fn take(appdata_dir: &Path) -> Result<Vec<u8>> {
    let path = appdata_dir.join(DATA_JSON);
    let contents = fs::read(&path)?;
    fs::remove_file(&path)?;
    Ok(contents)
}

fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        file.write_all(contents)?;
    }
    #[cfg(not(unix))]
    fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn install_then_drop_removes_file() {
        let dir = TempDir::new().unwrap();
        let path = {
            let file = SessionDataFile::install(dir.path(), b"{\"session\":1}").unwrap();
            assert_eq!(fs::read(file.path()).unwrap(), b"{\"session\":1}");
            file.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn take_reads_and_deletes() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(DATA_JSON), b"state").unwrap();
        assert_eq!(take(dir.path()).unwrap(), b"state");
        assert!(!dir.path().join(DATA_JSON).exists());
    }

    #[test]
    fn take_without_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(take(dir.path()).is_err());
    }
}
