//! `portwarden restore` — replay a backup file into an empty vault.

use tracing::info;

use crate::backup::{restore_backup_file, SessionLock};
use crate::cli::{
    acquire_session, bw_client, finish_session, output, resolve_passphrase, run_options, Cli,
};
use crate::deadline::Deadline;
use crate::errors::{PortwardenError, Result};

/// Execute the `restore` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let settings = cli.settings()?;
    let deadline = Deadline::from_seconds(settings.timeout_seconds);
    let file_name = cli.require_filename()?;
    if !file_name.exists() {
        return Err(PortwardenError::BackupNotFound(file_name.to_path_buf()));
    }

    let passphrase = resolve_passphrase(cli, false)?;

    let _lock = SessionLock::new(&settings.lock_file).acquire(&deadline)?;
    let client = bw_client(&settings, deadline);
    let session = acquire_session(cli, &client)?;

    info!(file = %file_name.display(), "starting restore");
    let result = restore_backup_file(
        &client,
        file_name,
        &passphrase,
        &session,
        &run_options(&settings, deadline),
    );
    finish_session(cli, &client);

    // Partial restores still show what was created and skipped.
    if let Err(PortwardenError::AttachmentReplayFailed { report, .. }) = &result {
        output::print_restore_report(report);
    }
    output::print_restore_report(&result?);
    Ok(())
}
