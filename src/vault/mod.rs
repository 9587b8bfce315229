//! Vault access: record types, sessions, and the `VaultClient` boundary.
//!
//! - `records` — folder / item / attachment JSON records
//! - `session` — session tokens, login credentials, session output parsing
//! - `client` — the `VaultClient` trait the pipelines are written against
//! - `bw` — implementation backed by the `bw` command-line tool
//! - `memory` — in-memory implementation for tests
//! - `appdata` — the tool's ephemeral `data.json` session file

pub mod appdata;
pub mod bw;
pub mod client;
pub mod memory;
pub mod records;
pub mod session;

pub use bw::BwCli;
pub use client::VaultClient;
pub use memory::MemoryVault;
pub use records::{AttachmentRecord, FolderRecord, ItemRecord};
pub use session::{LoginCredentials, LoginMethod, SessionToken};
