//! Integration tests for the export pipeline, run against `MemoryVault`.

use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use portwarden::backup::archive;
use portwarden::backup::export::{create_backup_file, decrypt_backup_file, export};
use portwarden::backup::{RunOptions, Throttle};
use portwarden::crypto::decrypt_with_passphrase;
use portwarden::errors::PortwardenError;
use portwarden::vault::memory::Call;
use portwarden::vault::{MemoryVault, SessionToken};
use tempfile::TempDir;

fn session() -> SessionToken {
    SessionToken::new("test-session")
}

fn seeded_vault() -> MemoryVault {
    let vault = MemoryVault::new();
    vault.add_folder("f1", "Work");
    vault.add_item("i1", "GitHub", Some("f1"));
    vault.add_item("i2", "Bank", None);
    vault.add_attachment("i1", "a1", "recovery-codes.txt", b"1234-5678");
    vault.add_attachment("i2", "a2", "statement.pdf", b"%PDF-1.7");
    vault
}

/// Staging directories are hidden `.portwarden-*` entries of the work dir.
fn leftover_staging(work: &TempDir) -> Vec<String> {
    fs::read_dir(work.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|n| n.starts_with(".portwarden-"))
        .collect()
}

#[test]
fn export_produces_decryptable_archive_with_manifests_and_attachments() {
    let work = TempDir::new().unwrap();
    let vault = seeded_vault();

    let backup = export(&vault, &session(), "pw", &RunOptions::new(work.path())).unwrap();

    let zip = decrypt_with_passphrase(&backup, "pw").unwrap();
    let out = TempDir::new().unwrap();
    archive::unpack(&zip, out.path()).unwrap();

    let root = out.path().join("portwarden_backup");
    let folders: serde_json::Value =
        serde_json::from_slice(&fs::read(root.join("folders.json")).unwrap()).unwrap();
    let items: serde_json::Value =
        serde_json::from_slice(&fs::read(root.join("items.json")).unwrap()).unwrap();

    assert_eq!(folders[0]["id"], "f1");
    assert_eq!(items.as_array().unwrap().len(), 2);
    assert_eq!(items[0]["folderId"], "f1");
    assert_eq!(
        fs::read(root.join("GitHub").join("recovery-codes.txt")).unwrap(),
        b"1234-5678"
    );
    assert_eq!(
        fs::read(root.join("Bank").join("statement.pdf")).unwrap(),
        b"%PDF-1.7"
    );
}

#[test]
fn export_lists_folders_then_items_then_downloads() {
    let work = TempDir::new().unwrap();
    let vault = seeded_vault();

    export(&vault, &session(), "pw", &RunOptions::new(work.path())).unwrap();

    let calls = vault.calls();
    assert_eq!(calls[0], Call::ListFolders);
    assert_eq!(calls[1], Call::ListItems);
    assert!(matches!(calls[2], Call::GetAttachment { ref attachment_id, .. } if attachment_id == "a1"));
    assert!(matches!(calls[3], Call::GetAttachment { ref attachment_id, .. } if attachment_id == "a2"));
    assert_eq!(vault.create_calls(), 0);
}

#[test]
fn staging_is_removed_after_success() {
    let work = TempDir::new().unwrap();
    export(&seeded_vault(), &session(), "pw", &RunOptions::new(work.path())).unwrap();
    assert!(leftover_staging(&work).is_empty());
}

#[test]
fn attachment_failure_aborts_and_names_the_attachment() {
    let work = TempDir::new().unwrap();
    let vault = seeded_vault();
    vault.fail_download("a2");

    let err = export(&vault, &session(), "pw", &RunOptions::new(work.path())).unwrap_err();

    match &err {
        PortwardenError::AttachmentFetchFailed {
            item_id,
            item_name,
            attachment_id,
            ..
        } => {
            assert_eq!(item_id, "i2");
            assert_eq!(item_name, "Bank");
            assert_eq!(attachment_id, "a2");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(leftover_staging(&work).is_empty());
}

#[test]
fn throttle_runs_once_per_download() {
    let work = TempDir::new().unwrap();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    let throttle = Throttle::from_fn(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Duration::ZERO
    });

    let options = RunOptions::new(work.path()).with_throttle(throttle);
    export(&seeded_vault(), &session(), "pw", &options).unwrap();

    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[test]
fn empty_vault_still_exports_manifests() {
    let work = TempDir::new().unwrap();
    let backup = export(&MemoryVault::new(), &session(), "pw", &RunOptions::new(work.path())).unwrap();

    let zip = decrypt_with_passphrase(&backup, "pw").unwrap();
    let out = TempDir::new().unwrap();
    archive::unpack(&zip, out.path()).unwrap();

    let items = fs::read_to_string(out.path().join("portwarden_backup/items.json")).unwrap();
    assert_eq!(items.trim(), "[]");
}

#[test]
fn backup_file_roundtrip_through_disk() {
    let work = TempDir::new().unwrap();
    let target = work.path().join("nightly");

    let path = create_backup_file(
        &seeded_vault(),
        &session(),
        &target,
        "pw",
        &RunOptions::new(work.path()),
    )
    .unwrap();
    assert_eq!(path, work.path().join("nightly.portwarden"));

    let decrypted = decrypt_backup_file(&path, "pw").unwrap();
    assert_eq!(decrypted, work.path().join("nightly.portwarden.decrypted.zip"));
    assert!(fs::read(&decrypted).unwrap().starts_with(b"PK"));
}

#[test]
fn failed_export_writes_no_backup_file() {
    let work = TempDir::new().unwrap();
    let vault = seeded_vault();
    vault.fail_download("a1");

    let target = work.path().join("broken");
    assert!(create_backup_file(&vault, &session(), &target, "pw", &RunOptions::new(work.path())).is_err());
    assert!(!work.path().join("broken.portwarden").exists());
}
