//! In-memory `VaultClient` for tests and dry runs.
//!
//! Records every call in order so tests can assert on replay ordering and
//! payloads, and can be told to fail specific attachment transfers.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::Path;

use serde_json::{json, Value};

use super::client::VaultClient;
use super::records::{AttachmentRecord, FolderRecord, ItemRecord};
use super::session::{LoginCredentials, SessionToken};
use crate::errors::{PortwardenError, Result};

/// One call made against a `MemoryVault`.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Unlock,
    Login { email: String },
    ListItems,
    ListFolders,
    GetAttachment { item_id: String, attachment_id: String },
    CreateFolder(Value),
    CreateItem(Value),
    CreateAttachment { item_id: String, file_name: String, contents: Vec<u8> },
    Logout,
}

#[derive(Default)]
struct State {
    folders: Vec<FolderRecord>,
    items: Vec<ItemRecord>,
    blobs: HashMap<(String, String), Vec<u8>>,
    calls: Vec<Call>,
    next_ids: VecDeque<String>,
    counter: usize,
    failing_downloads: HashSet<String>,
    failing_uploads: HashSet<String>,
    omit_created_ids: bool,
}

/// A vault that lives entirely in memory.
#[derive(Default)]
pub struct MemoryVault {
    state: RefCell<State>,
}

impl MemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a folder.
    pub fn add_folder(&self, id: &str, name: &str) {
        self.state.borrow_mut().folders.push(FolderRecord {
            id: Some(id.to_string()),
            name: name.to_string(),
            extra: Default::default(),
        });
    }

    /// Seed an item, optionally inside a folder.
    pub fn add_item(&self, id: &str, name: &str, folder_id: Option<&str>) {
        self.state.borrow_mut().items.push(ItemRecord {
            id: id.to_string(),
            name: name.to_string(),
            folder_id: folder_id.map(str::to_string),
            organization_id: None,
            collection_ids: None,
            attachments: Vec::new(),
            extra: Default::default(),
        });
    }

    /// Seed an item owned by an organization.
    pub fn add_org_item(&self, id: &str, name: &str, organization_id: &str) {
        self.add_item(id, name, None);
        let mut state = self.state.borrow_mut();
        if let Some(item) = state.items.last_mut() {
            item.organization_id = Some(organization_id.to_string());
            item.collection_ids = Some(vec!["c1".to_string()]);
        }
    }

    /// Seed an attachment on an existing item.
    pub fn add_attachment(&self, item_id: &str, attachment_id: &str, file_name: &str, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        if let Some(item) = state.items.iter_mut().find(|i| i.id == item_id) {
            item.attachments.push(AttachmentRecord {
                id: attachment_id.to_string(),
                file_name: file_name.to_string(),
                extra: Default::default(),
            });
        }
        state
            .blobs
            .insert((item_id.to_string(), attachment_id.to_string()), data.to_vec());
    }

    /// Ids handed out (in order) to the next created folders/items.
    pub fn queue_ids<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state
            .borrow_mut()
            .next_ids
            .extend(ids.into_iter().map(Into::into));
    }

    /// Make `get_attachment` fail for this attachment id.
    pub fn fail_download(&self, attachment_id: &str) {
        self.state
            .borrow_mut()
            .failing_downloads
            .insert(attachment_id.to_string());
    }

    /// Make `create_attachment` fail for files with this name.
    pub fn fail_upload(&self, file_name: &str) {
        self.state
            .borrow_mut()
            .failing_uploads
            .insert(file_name.to_string());
    }

    /// Answer create calls with a body that carries no `id`.
    pub fn omit_created_ids(&self) {
        self.state.borrow_mut().omit_created_ids = true;
    }

    /// Every call made so far, oldest first.
    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    /// Number of create calls of any kind.
    pub fn create_calls(&self) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|c| {
                matches!(
                    c,
                    Call::CreateFolder(_) | Call::CreateItem(_) | Call::CreateAttachment { .. }
                )
            })
            .count()
    }

    pub fn folders(&self) -> Vec<FolderRecord> {
        self.state.borrow().folders.clone()
    }

    pub fn items(&self) -> Vec<ItemRecord> {
        self.state.borrow().items.clone()
    }

    fn record(&self, call: Call) {
        self.state.borrow_mut().calls.push(call);
    }

    fn issue_id(&self, prefix: &str) -> String {
        let mut state = self.state.borrow_mut();
        if let Some(id) = state.next_ids.pop_front() {
            return id;
        }
        state.counter += 1;
        format!("{prefix}-{}", state.counter)
    }

    fn created_response(&self, mut value: Value, id: &str) -> Result<Vec<u8>> {
        if self.state.borrow().omit_created_ids {
            return Ok(b"{}".to_vec());
        }
        value["id"] = json!(id);
        serde_json::to_vec(&value).map_err(|e| PortwardenError::MalformedVaultData(e.to_string()))
    }
}

fn client_error(command: &str, message: String) -> PortwardenError {
    PortwardenError::VaultClient {
        command: command.to_string(),
        message,
        stdout: Vec::new(),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| PortwardenError::MalformedVaultData(e.to_string()))
}

impl VaultClient for MemoryVault {
    fn unlock(&self) -> Result<SessionToken> {
        self.record(Call::Unlock);
        Ok(SessionToken::new("memory-session"))
    }

    fn login(&self, credentials: &LoginCredentials) -> Result<SessionToken> {
        self.record(Call::Login {
            email: credentials.email.clone(),
        });
        Ok(SessionToken::new("memory-session"))
    }

    fn list_items(&self, _session: &SessionToken) -> Result<Vec<u8>> {
        self.record(Call::ListItems);
        to_json(&self.state.borrow().items)
    }

    fn list_folders(&self, _session: &SessionToken) -> Result<Vec<u8>> {
        self.record(Call::ListFolders);
        to_json(&self.state.borrow().folders)
    }

    fn get_attachment(
        &self,
        item_id: &str,
        attachment_id: &str,
        _session: &SessionToken,
        output_dir: &Path,
    ) -> Result<()> {
        self.record(Call::GetAttachment {
            item_id: item_id.to_string(),
            attachment_id: attachment_id.to_string(),
        });
        if self.state.borrow().failing_downloads.contains(attachment_id) {
            return Err(client_error(
                "get attachment",
                format!("download of {attachment_id} refused"),
            ));
        }

        let (file_name, data) = {
            let state = self.state.borrow();
            let file_name = state
                .items
                .iter()
                .find(|i| i.id == item_id)
                .and_then(|i| i.attachments.iter().find(|a| a.id == attachment_id))
                .map(|a| a.file_name.clone())
                .ok_or_else(|| client_error("get attachment", "Not found.".into()))?;
            let data = state
                .blobs
                .get(&(item_id.to_string(), attachment_id.to_string()))
                .cloned()
                .unwrap_or_default();
            (file_name, data)
        };

        fs::create_dir_all(output_dir)?;
        fs::write(output_dir.join(file_name), data)?;
        Ok(())
    }

    fn create_folder(&self, _session: &SessionToken, folder_json: &[u8]) -> Result<Vec<u8>> {
        let value: Value = serde_json::from_slice(folder_json)
            .map_err(|e| client_error("create folder", e.to_string()))?;
        self.record(Call::CreateFolder(value.clone()));

        let id = self.issue_id("folder");
        let name = value["name"].as_str().unwrap_or_default().to_string();
        self.state.borrow_mut().folders.push(FolderRecord {
            id: Some(id.clone()),
            name,
            extra: Default::default(),
        });
        self.created_response(value, &id)
    }

    fn create_item(&self, _session: &SessionToken, item_json: &[u8]) -> Result<Vec<u8>> {
        let value: Value = serde_json::from_slice(item_json)
            .map_err(|e| client_error("create item", e.to_string()))?;
        self.record(Call::CreateItem(value.clone()));

        let id = self.issue_id("item");
        let mut stored = value.clone();
        stored["id"] = json!(id);
        let item: ItemRecord = serde_json::from_value(stored)
            .map_err(|e| client_error("create item", e.to_string()))?;
        self.state.borrow_mut().items.push(item);
        self.created_response(value, &id)
    }

    fn create_attachment(
        &self,
        item_id: &str,
        _session: &SessionToken,
        file_path: &Path,
    ) -> Result<()> {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let contents = fs::read(file_path).unwrap_or_default();
        self.record(Call::CreateAttachment {
            item_id: item_id.to_string(),
            file_name: file_name.clone(),
            contents: contents.clone(),
        });

        if self.state.borrow().failing_uploads.contains(&file_name) {
            return Err(client_error(
                "create attachment",
                format!("upload of {file_name} refused"),
            ));
        }
        if !file_path.exists() {
            return Err(client_error(
                "create attachment",
                format!("{} does not exist", file_path.display()),
            ));
        }

        let attachment_id = self.issue_id("attachment");
        let mut state = self.state.borrow_mut();
        let item = state
            .items
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| client_error("create attachment", "Item not found.".into()))?;
        item.attachments.push(AttachmentRecord {
            id: attachment_id.clone(),
            file_name,
            extra: Default::default(),
        });
        state.blobs.insert((item_id.to_string(), attachment_id), contents);
        Ok(())
    }

    fn logout(&self) -> Result<()> {
        self.record(Call::Logout);
        Ok(())
    }
}
