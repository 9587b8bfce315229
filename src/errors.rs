use std::path::PathBuf;
use thiserror::Error;

use crate::backup::RestoreReport;

/// All errors that can occur in Portwarden.
#[derive(Debug, Error)]
pub enum PortwardenError {
    // --- Crypto errors ---
    #[error("Wrong backup passphrase entered, or the backup file is corrupted")]
    CryptoAuthenticationFailure,

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    // --- Vault client errors ---
    #[error("`bw {command}` failed: {message}")]
    VaultClient {
        command: String,
        message: String,
        /// Whatever the tool printed on stdout before failing.
        stdout: Vec<u8>,
    },

    #[error("Vault is locked — unlock it or set BW_SESSION")]
    VaultLocked,

    #[error("You are not logged in to the vault")]
    NotLoggedIn,

    #[error("Session key extraction failed: {0}")]
    SessionKeyExtractionFailed(String),

    #[error("Malformed vault data: {0}")]
    MalformedVaultData(String),

    // --- Export errors ---
    #[error("Failed to download attachment '{attachment_id}' of item '{item_name}' ({item_id}): {source}")]
    AttachmentFetchFailed {
        item_id: String,
        item_name: String,
        attachment_id: String,
        #[source]
        source: Box<PortwardenError>,
    },

    // --- Restore errors ---
    #[error("The account's vault is not empty — a backup can only be restored into an empty vault")]
    VaultNotEmpty,

    #[error("{kind} '{name}' ({old_id}) was created but the vault returned no usable id")]
    PartialReplayFailure {
        kind: &'static str,
        old_id: String,
        name: String,
    },

    /// Folders and items were restored, some attachments were not.
    /// `report` describes everything that did get restored.
    #[error("{} attachment(s) could not be restored: {}", .failures.len(), format_failures(.failures))]
    AttachmentReplayFailed {
        failures: Vec<AttachmentFailure>,
        report: Box<RestoreReport>,
    },

    // --- Archive errors ---
    #[error("Archive error: {0}")]
    Archive(String),

    // --- Run control ---
    #[error("Operation cancelled — deadline exceeded")]
    Cancelled,

    #[error("Session lock error: {0}")]
    LockError(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Backup file not found at {0}")]
    BackupNotFound(PathBuf),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("No passphrase provided")]
    NoPassphraseProvided,

    #[error("No filename provided")]
    NoFilenameProvided,

}

/// One attachment that could not be re-uploaded during a restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentFailure {
    pub item_id: String,
    pub item_name: String,
    pub attachment_id: String,
    pub file_name: String,
    pub reason: String,
}

fn format_failures(failures: &[AttachmentFailure]) -> String {
    failures
        .iter()
        .map(|f| {
            format!(
                "item '{}' ({}) attachment {} '{}': {}",
                f.item_name, f.item_id, f.attachment_id, f.file_name, f.reason
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<zip::result::ZipError> for PortwardenError {
    fn from(e: zip::result::ZipError) -> Self {
        PortwardenError::Archive(e.to_string())
    }
}

/// Convenience type alias for Portwarden results.
pub type Result<T> = std::result::Result<T, PortwardenError>;
