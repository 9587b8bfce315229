//! `portwarden decrypt` — turn a backup file back into a plain zip archive.

use crate::backup::decrypt_backup_file;
use crate::cli::{output, resolve_passphrase, Cli};
use crate::errors::Result;

/// Execute the `decrypt` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let file_name = cli.require_filename()?;
    let passphrase = resolve_passphrase(cli, false)?;

    let out = decrypt_backup_file(file_name, &passphrase)?;

    output::success(&format!("Backup decrypted to {}", out.display()));
    output::warning("The archive is not encrypted. Delete it once you are done with it.");
    Ok(())
}
