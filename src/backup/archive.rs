//! Zip archive of a staging directory tree.

use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Component, Path};

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::errors::{PortwardenError, Result};

/// Zip everything below `root`, entries named relative to `root`.
pub fn pack(root: &Path) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| PortwardenError::Archive(format!("walking {}: {e}", root.display())))?;
        let name = entry_name(root, entry.path())?;
        if entry.file_type().is_dir() {
            writer.add_directory(name, options)?;
        } else if entry.file_type().is_file() {
            writer.start_file(name, options)?;
            let mut file = File::open(entry.path())?;
            io::copy(&mut file, &mut writer)?;
        }
    }

    Ok(writer.finish()?.into_inner())
}

/// Extract `archive` below `dest`.
///
/// Entries that would land outside `dest` (absolute paths, `..`) are
/// rejected before anything is written for them.
pub fn unpack(archive: &[u8], dest: &Path) -> Result<()> {
    let mut zip = ZipArchive::new(Cursor::new(archive))
        .map_err(|e| PortwardenError::MalformedInput(format!("not a backup archive: {e}")))?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let relative = entry.enclosed_name().ok_or_else(|| {
            PortwardenError::Archive(format!("unsafe entry path '{}'", entry.name()))
        })?;
        let out_path = dest.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)?;
        } else {
            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&out_path)?;
            io::copy(&mut entry, &mut out)?;
        }
    }
    Ok(())
}

/// Forward-slash entry name of `path` relative to `root`.
fn entry_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|e| PortwardenError::Archive(format!("{}: {e}", path.display())))?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn pack_and_unpack_preserve_tree() {
        let src = TempDir::new().unwrap();
        let base = src.path().join("portwarden_backup");
        fs::create_dir_all(base.join("My Login")).unwrap();
        fs::write(base.join("items.json"), b"[]").unwrap();
        fs::write(base.join("My Login").join("key.pem"), b"-----BEGIN-----").unwrap();
        fs::create_dir_all(base.join("empty")).unwrap();

        let bytes = pack(src.path()).unwrap();

        let dest = TempDir::new().unwrap();
        unpack(&bytes, dest.path()).unwrap();
        let out = dest.path().join("portwarden_backup");
        assert_eq!(fs::read(out.join("items.json")).unwrap(), b"[]");
        assert_eq!(
            fs::read(out.join("My Login").join("key.pem")).unwrap(),
            b"-----BEGIN-----"
        );
        assert!(out.join("empty").is_dir());
    }

    #[test]
    fn entries_are_relative_to_root() {
        let src = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join("portwarden_backup")).unwrap();
        fs::write(src.path().join("portwarden_backup/folders.json"), b"[]").unwrap();

        let bytes = pack(src.path()).unwrap();
        let zip = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let names: Vec<&str> = zip.file_names().collect();
        assert!(names.contains(&"portwarden_backup/folders.json"));
        assert!(names.iter().all(|n| !n.starts_with('/')));
    }

    #[test]
    fn unpack_rejects_path_traversal() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("../escape.txt", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"x").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let dest = TempDir::new().unwrap();
        let result = unpack(&bytes, &dest.path().join("inner"));
        assert!(matches!(result, Err(PortwardenError::Archive(_))));
        assert!(!dest.path().join("escape.txt").exists());
    }

    #[test]
    fn unpack_rejects_non_zip() {
        let dest = TempDir::new().unwrap();
        assert!(matches!(
            unpack(b"definitely not a zip", dest.path()),
            Err(PortwardenError::MalformedInput(_))
        ));
    }
}
