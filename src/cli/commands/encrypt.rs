//! `portwarden encrypt` — export the vault into an encrypted backup file.

use std::path::PathBuf;

use tracing::info;

use crate::backup::{create_backup_file, SessionLock};
use crate::cli::{
    acquire_session, bw_client, finish_session, output, resolve_passphrase, run_options, Cli,
};
use crate::deadline::Deadline;
use crate::errors::Result;

/// Execute the `encrypt` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let settings = cli.settings()?;
    let deadline = Deadline::from_seconds(settings.timeout_seconds);
    let file_name = cli.filename.clone().unwrap_or_else(default_file_name);

    let passphrase = resolve_passphrase(cli, true)?;

    let _lock = SessionLock::new(&settings.lock_file).acquire(&deadline)?;
    let client = bw_client(&settings, deadline);
    let session = acquire_session(cli, &client)?;

    info!(file = %file_name.display(), "starting export");
    let result = create_backup_file(
        &client,
        &session,
        &file_name,
        &passphrase,
        &run_options(&settings, deadline),
    );
    finish_session(cli, &client);

    let path = result?;
    output::success(&format!("Vault backed up to {}", path.display()));
    Ok(())
}

/// `portwarden_backup_<UTC timestamp>`, used when no `--filename` is given.
fn default_file_name() -> PathBuf {
    let stamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    PathBuf::from(format!("portwarden_backup_{stamp}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_file_name_is_timestamped() {
        let name = default_file_name();
        let name = name.to_string_lossy();
        assert!(name.starts_with("portwarden_backup_"));
        assert_eq!(name.len(), "portwarden_backup_".len() + 15);
    }
}
