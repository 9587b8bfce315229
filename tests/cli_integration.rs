//! Integration tests for the Portwarden CLI.
//!
//! These tests exercise the binary end-to-end using `assert_cmd`.
//! Vault access goes through a fake `bw` shell script, so no real
//! Bitwarden account is needed.

use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

use portwarden::crypto::{decrypt_with_passphrase, encrypt_with_passphrase};

/// Helper: get a Command pointing at the portwarden binary, isolated from
/// the caller's environment.
fn portwarden() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("portwarden").expect("binary should exist");
    cmd.env_remove("PORTWARDEN_PASSPHRASE")
        .env_remove("BW_SESSION")
        .env("RUST_LOG", "warn");
    cmd
}

#[test]
fn help_flag_shows_usage() {
    portwarden()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("encrypted backups"))
        .stdout(predicate::str::contains("encrypt"))
        .stdout(predicate::str::contains("decrypt"))
        .stdout(predicate::str::contains("restore"))
        .stdout(predicate::str::contains("--passphrase"))
        .stdout(predicate::str::contains("--sleep-milliseconds"));
}

#[test]
fn version_flag_shows_version() {
    portwarden()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("portwarden"));
}

#[test]
fn no_args_shows_help() {
    portwarden()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn decrypt_without_filename_fails() {
    portwarden()
        .args(["decrypt", "--passphrase", "pw"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No filename provided"));
}

#[test]
fn decrypt_without_passphrase_fails_when_not_a_terminal() {
    let tmp = TempDir::new().unwrap();
    let backup = tmp.child("vault.portwarden");
    backup.write_binary(&encrypt_with_passphrase(b"zip", "pw").unwrap()).unwrap();

    portwarden()
        .args(["decrypt", "--filename"])
        .arg(backup.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("No passphrase provided"));
}

#[test]
fn decrypt_writes_decrypted_zip() {
    let tmp = TempDir::new().unwrap();
    let backup = tmp.child("vault.portwarden");
    backup
        .write_binary(&encrypt_with_passphrase(b"PK fake archive", "pw").unwrap())
        .unwrap();

    portwarden()
        .args(["d", "--passphrase", "pw", "--filename"])
        .arg(backup.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("decrypted.zip"));

    tmp.child("vault.portwarden.decrypted.zip")
        .assert(predicate::path::exists());
    assert_eq!(
        std::fs::read(tmp.path().join("vault.portwarden.decrypted.zip")).unwrap(),
        b"PK fake archive"
    );
}

#[test]
fn decrypt_with_wrong_passphrase_is_friendly() {
    let tmp = TempDir::new().unwrap();
    let backup = tmp.child("vault.portwarden");
    backup
        .write_binary(&encrypt_with_passphrase(b"PK", "right").unwrap())
        .unwrap();

    portwarden()
        .args(["decrypt", "--filename"])
        .arg(backup.path())
        .env("PORTWARDEN_PASSPHRASE", "wrong")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Wrong backup passphrase"));

    tmp.child("vault.portwarden.decrypted.zip")
        .assert(predicate::path::missing());
}

#[test]
fn restore_of_missing_file_fails() {
    let tmp = TempDir::new().unwrap();
    portwarden()
        .current_dir(tmp.path())
        .args(["restore", "--passphrase", "pw", "--filename", "nope.portwarden"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Backup file not found"));
}

#[test]
fn completions_generate_for_bash() {
    portwarden()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("portwarden"));
}

#[test]
fn completions_reject_unknown_shell() {
    portwarden()
        .args(["completions", "tcsh"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown shell"));
}

#[test]
fn invalid_config_file_is_reported() {
    let tmp = TempDir::new().unwrap();
    tmp.child(".portwarden.toml").write_str("sleep_milliseconds = [").unwrap();

    portwarden()
        .current_dir(tmp.path())
        .args(["encrypt", "--passphrase", "pw"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file error"));
}

#[cfg(unix)]
mod with_fake_bw {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// A `bw` stand-in serving one folder and one item.
    const FAKE_BW: &str = r#"#!/bin/sh
case "$2 $3" in
  "list folders") echo '[{"id":"f1","name":"Work","object":"folder"}]' ;;
  "list items") echo '[{"id":"i1","name":"GitHub","folderId":"f1","type":1}]' ;;
  *) exit 0 ;;
esac
"#;

    fn install_fake_bw(tmp: &TempDir) -> std::path::PathBuf {
        let script = tmp.child("bw");
        script.write_str(FAKE_BW).unwrap();
        let mut perms = std::fs::metadata(script.path()).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(script.path(), perms).unwrap();
        script.path().to_path_buf()
    }

    #[test]
    fn encrypt_writes_backup_using_session_from_env() {
        let tmp = TempDir::new().unwrap();
        let bw = install_fake_bw(&tmp);
        tmp.child(".portwarden.toml")
            .write_str(&format!(
                "lock_file = \"{}\"\nsleep_milliseconds = 0\n",
                tmp.path().join("pw.lock").display()
            ))
            .unwrap();

        portwarden()
            .current_dir(tmp.path())
            .env("BW_SESSION", "fake-session")
            .args(["encrypt", "--passphrase", "pw", "--filename", "nightly", "--bw-binary"])
            .arg(&bw)
            .assert()
            .success()
            .stdout(predicate::str::contains("nightly.portwarden"));

        let backup = std::fs::read(tmp.path().join("nightly.portwarden")).unwrap();
        let zip = decrypt_with_passphrase(&backup, "pw").unwrap();
        assert!(zip.starts_with(b"PK"));

        // Lock released, staging gone.
        let lock = portwarden::backup::SessionLock::new(tmp.path().join("pw.lock"));
        assert!(lock.try_acquire().unwrap().is_some());
        let leftovers = std::fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".portwarden-"))
            .count();
        assert_eq!(leftovers, 0);
    }
}
