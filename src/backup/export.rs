//! Export pipeline: vault → staging directory → zip → encrypted backup.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info, warn};

use super::archive;
use super::lock::SessionGuard;
use super::staging::StagingDir;
use super::RunOptions;
use crate::crypto;
use crate::errors::{PortwardenError, Result};
use crate::vault::appdata::SessionDataFile;
use crate::vault::records::{parse_folders, parse_items, ItemRecord};
use crate::vault::{SessionToken, VaultClient};

/// Extension of encrypted backup files.
pub const BACKUP_EXTENSION: &str = ".portwarden";

/// Suffix appended to a backup's name when it is decrypted to disk.
pub const DECRYPTED_SUFFIX: &str = ".decrypted.zip";

/// Export the whole vault and return the encrypted backup bytes.
///
/// The staging directory is removed before this returns, whatever the
/// outcome.  Nothing is retried.
pub fn export(
    client: &dyn VaultClient,
    session: &SessionToken,
    passphrase: &str,
    options: &RunOptions,
) -> Result<Vec<u8>> {
    let staging = StagingDir::create(&options.work_dir)?;
    let archive = stage_and_pack(client, session, &staging, options);

    match staging.remove() {
        Ok(()) => {}
        Err(e) if archive.is_ok() => return Err(e),
        Err(e) => warn!(error = %e, "failed to remove staging directory after export error"),
    }

    let archive = archive?;
    options.deadline.check()?;
    crypto::encrypt_with_passphrase(&archive, passphrase)
}

/// Export while the tool's `data.json` is installed into `appdata_dir`.
///
/// Used by hosted workers that keep a captured login per account.  The
/// guard proves the caller holds the host's session lock for the whole
/// window the file exists.
pub fn export_with_session_data(
    client: &dyn VaultClient,
    _lock: &SessionGuard,
    appdata_dir: &Path,
    data_json: &[u8],
    session: &SessionToken,
    passphrase: &str,
    options: &RunOptions,
) -> Result<Vec<u8>> {
    let _data = SessionDataFile::install(appdata_dir, data_json)?;
    export(client, session, passphrase, options)
}

/// Export and write the backup to `file_name` (`.portwarden` appended
/// when missing).  The file is only created once the export succeeded.
pub fn create_backup_file(
    client: &dyn VaultClient,
    session: &SessionToken,
    file_name: &Path,
    passphrase: &str,
    options: &RunOptions,
) -> Result<PathBuf> {
    let path = backup_file_path(file_name);
    let encrypted = export(client, session, passphrase, options)?;
    fs::write(&path, encrypted)?;
    info!(path = %path.display(), "backup written");
    Ok(path)
}

/// Decrypt a backup file to `<file>.decrypted.zip` and return that path.
pub fn decrypt_backup_file(file_name: &Path, passphrase: &str) -> Result<PathBuf> {
    let encrypted = read_backup(file_name)?;
    let archive = crypto::decrypt_with_passphrase(&encrypted, passphrase)?;

    let mut out: OsString = file_name.as_os_str().to_os_string();
    out.push(DECRYPTED_SUFFIX);
    let out = PathBuf::from(out);
    fs::write(&out, archive)?;
    Ok(out)
}

/// `name` with the `.portwarden` extension, appended when missing.
pub fn backup_file_path(name: &Path) -> PathBuf {
    if name.to_string_lossy().ends_with(BACKUP_EXTENSION) {
        name.to_path_buf()
    } else {
        let mut s = name.as_os_str().to_os_string();
        s.push(BACKUP_EXTENSION);
        PathBuf::from(s)
    }
}

/// Read a backup file, mapping a missing file to `BackupNotFound`.
pub fn read_backup(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PortwardenError::BackupNotFound(path.to_path_buf()),
        _ => e.into(),
    })
}

fn stage_and_pack(
    client: &dyn VaultClient,
    session: &SessionToken,
    staging: &StagingDir,
    options: &RunOptions,
) -> Result<Vec<u8>> {
    options.deadline.check()?;
    let raw = client.list_folders(session)?;
    let folders = parse_folders(&raw)?;
    write_pretty(&staging.folders_json(), &folders)?;
    info!(count = folders.len(), "folders exported");

    options.deadline.check()?;
    let raw = client.list_items(session)?;
    let items = parse_items(&raw)?;
    write_pretty(&staging.items_json(), &items)?;
    info!(count = items.len(), "items exported");

    fetch_attachments(client, session, &items, staging, options)?;

    options.deadline.check()?;
    archive::pack(staging.root())
}

/// Download every attachment into `<staging>/<item name>/`.
///
/// The first failure aborts the export.
fn fetch_attachments(
    client: &dyn VaultClient,
    session: &SessionToken,
    items: &[ItemRecord],
    staging: &StagingDir,
    options: &RunOptions,
) -> Result<()> {
    let mut call_index = 0;
    for item in items.iter().filter(|i| !i.attachments.is_empty()) {
        let dir = staging.attachment_dir(item);
        fs::create_dir_all(&dir)?;

        for attachment in &item.attachments {
            options.deadline.check()?;
            if let Err(e) = client.get_attachment(&item.id, &attachment.id, session, &dir) {
                if matches!(e, PortwardenError::Cancelled) {
                    return Err(e);
                }
                error!(
                    item_id = %item.id,
                    item_name = %item.name,
                    attachment_id = %attachment.id,
                    error = %e,
                    "attachment download failed"
                );
                return Err(PortwardenError::AttachmentFetchFailed {
                    item_id: item.id.clone(),
                    item_name: item.name.clone(),
                    attachment_id: attachment.id.clone(),
                    source: Box::new(e),
                });
            }
            info!(item = %item.name, file = %attachment.file_name, "attachment downloaded");
            options.throttle.pause(call_index, &options.deadline)?;
            call_index += 1;
        }
    }
    Ok(())
}

fn write_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| PortwardenError::MalformedVaultData(format!("{}: {e}", path.display())))?;
    fs::write(path, bytes)?;
    Ok(())
}
