//! The boundary between the backup pipelines and the vault.

use std::path::Path;

use super::session::{LoginCredentials, SessionToken};
use crate::errors::Result;

/// Everything the export and restore pipelines need from a vault.
///
/// Calls are synchronous and may fail.  List and create calls return the
/// raw JSON the vault produced; parsing is the caller's job.
pub trait VaultClient {
    /// Unlock an already logged-in vault.
    fn unlock(&self) -> Result<SessionToken>;

    /// Log in with explicit credentials.
    fn login(&self, credentials: &LoginCredentials) -> Result<SessionToken>;

    /// JSON array of every item in the vault.
    fn list_items(&self, session: &SessionToken) -> Result<Vec<u8>>;

    /// JSON array of every folder in the vault.
    fn list_folders(&self, session: &SessionToken) -> Result<Vec<u8>>;

    /// Download one attachment into `output_dir`, under its own file name.
    fn get_attachment(
        &self,
        item_id: &str,
        attachment_id: &str,
        session: &SessionToken,
        output_dir: &Path,
    ) -> Result<()>;

    /// Create a folder from its JSON encoding; returns the new folder's JSON.
    fn create_folder(&self, session: &SessionToken, folder_json: &[u8]) -> Result<Vec<u8>>;

    /// Create an item from its JSON encoding; returns the new item's JSON.
    fn create_item(&self, session: &SessionToken, item_json: &[u8]) -> Result<Vec<u8>>;

    /// Upload `file_path` as an attachment of `item_id`.
    fn create_attachment(
        &self,
        item_id: &str,
        session: &SessionToken,
        file_path: &Path,
    ) -> Result<()>;

    fn logout(&self) -> Result<()>;
}
