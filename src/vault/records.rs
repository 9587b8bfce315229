//! Folder, item and attachment records as listed by the vault.
//!
//! Only the fields the backup pipeline acts on are typed.  Everything
//! else the vault returns (login data, notes, custom fields, ...) is kept
//! in `extra` so that a restored item carries the full original payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{PortwardenError, Result};

/// A folder.  `id` is `None` for the built-in "No Folder" entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An attachment reference; the blob itself is fetched separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub id: String,
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A vault item (login, note, card, identity, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "folderId", alias = "folderID", default)]
    pub folder_id: Option<String>,
    #[serde(rename = "organizationId", alias = "organizationID", default)]
    pub organization_id: Option<String>,
    #[serde(
        rename = "collectionIds",
        alias = "collectionIDs",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub collection_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AttachmentRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ItemRecord {
    /// Name of the staging sub-directory holding this item's attachments.
    ///
    /// The item name trimmed, with path separators replaced so a name can
    /// never escape the staging directory.
    pub fn attachment_dir_name(&self) -> String {
        let trimmed = self.name.trim();
        let cleaned: String = trimmed
            .chars()
            .map(|c| match c {
                '/' | '\\' | '\0' => '_',
                c => c,
            })
            .collect();
        match cleaned.as_str() {
            "" | "." | ".." => format!("_{}", self.id),
            _ => cleaned,
        }
    }
}

/// Parse the JSON array returned by `list folders`.
pub fn parse_folders(raw: &[u8]) -> Result<Vec<FolderRecord>> {
    serde_json::from_slice(raw)
        .map_err(|e| PortwardenError::MalformedVaultData(format!("folder list: {e}")))
}

/// Parse the JSON array returned by `list items`.
pub fn parse_items(raw: &[u8]) -> Result<Vec<ItemRecord>> {
    serde_json::from_slice(raw)
        .map_err(|e| PortwardenError::MalformedVaultData(format!("item list: {e}")))
}

/// Pull a non-empty `id` field out of a create response.
pub fn extract_id(raw: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(raw).ok()?;
    match value.get("id")? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        _ => None,
    }
}
