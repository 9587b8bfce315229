//! Restore engine: encrypted backup → empty vault.
//!
//! Stages run strictly in order and each completes before the next starts:
//!
//! 1. decrypt the backup (wrong passphrase stops here, nothing written)
//! 2. unpack the archive into a staging directory
//! 3. refuse to continue unless the target vault has no items
//! 4. recreate folders, remembering old → new folder ids
//! 5. recreate items with remapped folder ids, remembering old → new item ids
//! 6. upload attachments to the recreated items
//! 7. remove the staging directory, whatever happened above
//!
//! Organization-owned items are skipped and reported: their collection
//! memberships cannot be rebuilt from a single-account export.  Nothing
//! is rolled back if a later stage fails.

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path};

use serde_json::Value;
use tracing::{error, info, warn};

use super::staging::StagingDir;
use super::{archive, export::read_backup, RunOptions};
use crate::crypto;
use crate::errors::{AttachmentFailure, PortwardenError, Result};
use crate::vault::records::{extract_id, parse_folders, parse_items, FolderRecord, ItemRecord};
use crate::vault::{SessionToken, VaultClient};

/// Old → new identifiers issued during one restore.
#[derive(Debug, Default)]
pub struct IdRemap {
    folders: HashMap<String, String>,
    items: HashMap<String, String>,
}

impl IdRemap {
    pub fn folder(&self, old_id: &str) -> Option<&str> {
        self.folders.get(old_id).map(String::as_str)
    }

    pub fn item(&self, old_id: &str) -> Option<&str> {
        self.items.get(old_id).map(String::as_str)
    }
}

/// An item left out of the restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub id: String,
    pub name: String,
    pub organization_id: String,
}

/// What a successful restore did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    pub folders_created: usize,
    pub items_created: usize,
    pub attachments_uploaded: usize,
    pub skipped_items: Vec<SkippedItem>,
}

/// Restore `backup` into the vault behind `client`.
pub fn restore(
    client: &dyn VaultClient,
    backup: &[u8],
    passphrase: &str,
    session: &SessionToken,
    options: &RunOptions,
) -> Result<RestoreReport> {
    let archive = crypto::decrypt_with_passphrase(backup, passphrase)?;
    options.deadline.check()?;

    let staging = StagingDir::create(&options.work_dir)?;
    let outcome = unpack_and_replay(client, &archive, session, &staging, options);

    if let Err(e) = staging.remove() {
        if outcome.is_ok() {
            return Err(e);
        }
        warn!(error = %e, "failed to remove staging directory after restore error");
    }
    outcome
}

/// Read a `.portwarden` file and restore it.
pub fn restore_backup_file(
    client: &dyn VaultClient,
    file_name: &Path,
    passphrase: &str,
    session: &SessionToken,
    options: &RunOptions,
) -> Result<RestoreReport> {
    let backup = read_backup(file_name)?;
    restore(client, &backup, passphrase, session, options)
}

fn unpack_and_replay(
    client: &dyn VaultClient,
    archive: &[u8],
    session: &SessionToken,
    staging: &StagingDir,
    options: &RunOptions,
) -> Result<RestoreReport> {
    archive::unpack(archive, staging.root())?;
    let folders = read_folders(staging)?;
    let items = read_items(staging)?;

    ensure_vault_empty(client, session)?;

    let mut remap = IdRemap::default();
    let mut report = RestoreReport::default();

    replay_folders(client, session, &folders, &mut remap, &mut report, options)?;
    replay_items(client, session, &items, &mut remap, &mut report, options)?;
    info!(items = report.items_created, "restoring items finished");

    // Attachment metadata comes from the manifest as exported, not from
    // the stripped payloads sent in stage 5.
    let original_items = read_items(staging)?;
    let failures =
        replay_attachments(client, session, &original_items, staging, &remap, &mut report, options)?;

    if failures.is_empty() {
        Ok(report)
    } else {
        Err(PortwardenError::AttachmentReplayFailed {
            failures,
            report: Box::new(report),
        })
    }
}

fn read_folders(staging: &StagingDir) -> Result<Vec<FolderRecord>> {
    let raw = read_manifest(&staging.folders_json())?;
    parse_folders(&raw)
}

fn read_items(staging: &StagingDir) -> Result<Vec<ItemRecord>> {
    let raw = read_manifest(&staging.items_json())?;
    parse_items(&raw)
}

fn read_manifest(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| {
        PortwardenError::MalformedInput(format!("backup has no {}: {e}", path.display()))
    })
}

/// Stage 3: the target vault must not contain a single item.
fn ensure_vault_empty(client: &dyn VaultClient, session: &SessionToken) -> Result<()> {
    let raw = client.list_items(session)?;
    let existing: Vec<Value> = serde_json::from_slice(&raw)
        .map_err(|e| PortwardenError::MalformedVaultData(format!("item list: {e}")))?;
    if existing.is_empty() {
        Ok(())
    } else {
        error!(existing = existing.len(), "target vault is not empty, refusing to restore");
        Err(PortwardenError::VaultNotEmpty)
    }
}

fn replay_folders(
    client: &dyn VaultClient,
    session: &SessionToken,
    folders: &[FolderRecord],
    remap: &mut IdRemap,
    report: &mut RestoreReport,
    options: &RunOptions,
) -> Result<()> {
    let with_id = folders
        .iter()
        .filter_map(|f| f.id.as_deref().map(|id| (id, f)));

    for (index, (old_id, folder)) in with_id.enumerate() {
        if index > 0 {
            options.throttle.pause(index, &options.deadline)?;
        }
        options.deadline.check()?;

        let payload = to_payload(folder)?;
        let response = client.create_folder(session, &payload);
        let new_id = created_id("folder", old_id, &folder.name, response)?;
        info!(name = %folder.name, old_id, new_id = %new_id, "folder restored");

        remap.folders.insert(old_id.to_string(), new_id);
        report.folders_created += 1;
    }
    Ok(())
}

fn replay_items(
    client: &dyn VaultClient,
    session: &SessionToken,
    items: &[ItemRecord],
    remap: &mut IdRemap,
    report: &mut RestoreReport,
    options: &RunOptions,
) -> Result<()> {
    let mut call_index = 0;
    for item in items {
        if let Some(org) = item.organization_id.as_deref().filter(|o| !o.is_empty()) {
            warn!(
                item_id = %item.id,
                name = %item.name,
                organization_id = org,
                "skipping organization-owned item"
            );
            report.skipped_items.push(SkippedItem {
                id: item.id.clone(),
                name: item.name.clone(),
                organization_id: org.to_string(),
            });
            continue;
        }

        if call_index > 0 {
            options.throttle.pause(call_index, &options.deadline)?;
        }
        call_index += 1;
        options.deadline.check()?;

        let payload = to_payload(&replay_payload(item, remap))?;
        let response = client.create_item(session, &payload);
        let new_id = created_id("item", &item.id, &item.name, response)?;
        info!(name = %item.name, old_id = %item.id, new_id = %new_id, "item restored");

        remap.items.insert(item.id.clone(), new_id);
        report.items_created += 1;
    }
    Ok(())
}

/// The item as it is sent to the vault: attachments stripped, collection
/// ids dropped, folder id rewritten through `remap`.
fn replay_payload(item: &ItemRecord, remap: &IdRemap) -> ItemRecord {
    let mut payload = item.clone();
    payload.attachments.clear();
    payload.collection_ids = None;
    payload.folder_id = item.folder_id.as_deref().and_then(|old| {
        let new = remap.folder(old);
        if new.is_none() {
            warn!(item = %item.name, folder_id = old, "folder not in backup, item restored without folder");
        }
        new.map(str::to_string)
    });
    payload
}

/// Upload every attachment; a failed upload is recorded and the rest go on.
fn replay_attachments(
    client: &dyn VaultClient,
    session: &SessionToken,
    items: &[ItemRecord],
    staging: &StagingDir,
    remap: &IdRemap,
    report: &mut RestoreReport,
    options: &RunOptions,
) -> Result<Vec<AttachmentFailure>> {
    let mut failures = Vec::new();
    let mut call_index = 0;

    for item in items.iter().filter(|i| !i.attachments.is_empty()) {
        let Some(new_item_id) = remap.item(&item.id) else {
            warn!(
                item = %item.name,
                count = item.attachments.len(),
                "item was not restored, its attachments are skipped"
            );
            continue;
        };
        let dir = staging.attachment_dir(item);

        for attachment in &item.attachments {
            if call_index > 0 {
                options.throttle.pause(call_index, &options.deadline)?;
            }
            call_index += 1;
            options.deadline.check()?;

            let result = if is_plain_file_name(&attachment.file_name) {
                client.create_attachment(new_item_id, session, &dir.join(&attachment.file_name))
            } else {
                Err(PortwardenError::MalformedInput(format!(
                    "unsafe attachment file name '{}'",
                    attachment.file_name
                )))
            };

            match result {
                Ok(()) => {
                    info!(item = %item.name, file = %attachment.file_name, "attachment restored");
                    report.attachments_uploaded += 1;
                }
                Err(PortwardenError::Cancelled) => return Err(PortwardenError::Cancelled),
                Err(e) => {
                    error!(
                        item_id = %item.id,
                        item = %item.name,
                        attachment_id = %attachment.id,
                        file = %attachment.file_name,
                        error = %e,
                        "attachment restore failed"
                    );
                    failures.push(AttachmentFailure {
                        item_id: item.id.clone(),
                        item_name: item.name.clone(),
                        attachment_id: attachment.id.clone(),
                        file_name: attachment.file_name.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }

    Ok(failures)
}

/// Resolve the new id from a create call.
///
/// A failed call that still printed a record with an id is logged and
/// accepted; a successful call without an id is a `PartialReplayFailure`.
fn created_id(
    kind: &'static str,
    old_id: &str,
    name: &str,
    response: Result<Vec<u8>>,
) -> Result<String> {
    match response {
        Ok(body) => extract_id(&body).ok_or_else(|| {
            error!(kind, old_id, name, "create returned no id");
            PortwardenError::PartialReplayFailure {
                kind,
                old_id: old_id.to_string(),
                name: name.to_string(),
            }
        }),
        Err(PortwardenError::VaultClient {
            command,
            message,
            stdout,
        }) => match extract_id(&stdout) {
            Some(new_id) => {
                warn!(kind, old_id, name, new_id = %new_id, error = %message, "create reported an error but returned an id");
                Ok(new_id)
            }
            None => {
                error!(kind, old_id, name, error = %message, "create failed");
                Err(PortwardenError::VaultClient {
                    command,
                    message,
                    stdout,
                })
            }
        },
        Err(e) => Err(e),
    }
}

fn to_payload<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| PortwardenError::MalformedVaultData(e.to_string()))
}

fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
