//! CLI module — Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::Parser;
use zeroize::Zeroizing;

use crate::backup::{RunOptions, Throttle};
use crate::config::Settings;
use crate::deadline::Deadline;
use crate::errors::{PortwardenError, Result};
use crate::vault::bw::SESSION_ENV;
use crate::vault::session::INVALID_MASTER_PASSWORD;
use crate::vault::{BwCli, LoginCredentials, LoginMethod, SessionToken, VaultClient};

/// Environment variable holding the master password for `--email` logins.
pub const MASTER_PASSWORD_ENV: &str = "PORTWARDEN_MASTER_PASSWORD";

/// Portwarden: encrypted backups of a Bitwarden vault.
#[derive(Parser)]
#[command(
    name = "portwarden",
    about = "Create and restore encrypted backups of a Bitwarden vault",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Backup passphrase (prompted for when omitted)
    #[arg(long, env = "PORTWARDEN_PASSPHRASE", global = true, hide_env_values = true)]
    pub passphrase: Option<String>,

    /// Backup file name
    #[arg(long, global = true)]
    pub filename: Option<PathBuf>,

    /// Pause between vault calls, in milliseconds (default: 300)
    #[arg(long, global = true)]
    pub sleep_milliseconds: Option<u64>,

    /// Abort the run after this many seconds (0 = never)
    #[arg(long, global = true)]
    pub timeout_seconds: Option<u64>,

    /// Keep the vault session logged in when done
    #[arg(long, global = true)]
    pub no_logout: bool,

    /// Path to the Bitwarden CLI binary
    #[arg(long, global = true)]
    pub bw_binary: Option<String>,

    /// Log in non-interactively with this account email
    #[arg(long, global = true)]
    pub email: Option<String>,

    /// Two-step login method: 0 authenticator, 1 email, 3 yubikey, 100 none
    #[arg(long, default_value = "100", global = true, value_parser = parse_login_method)]
    pub method: LoginMethod,

    /// Two-step login code
    #[arg(long, global = true)]
    pub code: Option<String>,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Export the vault into an encrypted backup file
    #[command(visible_alias = "e")]
    Encrypt,

    /// Decrypt a backup file into a plain zip archive
    #[command(visible_alias = "d")]
    Decrypt,

    /// Restore a backup file into an empty vault
    #[command(visible_alias = "r")]
    Restore,

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell)
        shell: String,
    },
}

fn parse_login_method(value: &str) -> std::result::Result<LoginMethod, String> {
    let code: i32 = value
        .parse()
        .map_err(|_| format!("'{value}' is not a login method code"))?;
    LoginMethod::try_from(code)
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

impl Cli {
    /// Settings from `.portwarden.toml` in the current directory, with
    /// command-line flags applied on top.
    pub fn settings(&self) -> Result<Settings> {
        let cwd = std::env::current_dir()?;
        let mut settings = Settings::load(&cwd)?;
        self.apply_overrides(&mut settings);
        Ok(settings)
    }

    fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(ms) = self.sleep_milliseconds {
            settings.sleep_milliseconds = ms;
        }
        if let Some(secs) = self.timeout_seconds {
            settings.timeout_seconds = secs;
        }
        if let Some(bin) = &self.bw_binary {
            settings.bw_binary = bin.clone();
        }
    }

    /// The `--filename` argument, or `NoFilenameProvided`.
    pub fn require_filename(&self) -> Result<&std::path::Path> {
        self.filename
            .as_deref()
            .ok_or(PortwardenError::NoFilenameProvided)
    }
}

/// Run options for one pipeline run.
pub fn run_options(settings: &Settings, deadline: Deadline) -> RunOptions {
    RunOptions::new(&settings.work_dir)
        .with_throttle(Throttle::from_millis(settings.sleep_milliseconds))
        .with_deadline(deadline)
}

/// A `bw` client honouring the configured binary, app-data dir and deadline.
pub fn bw_client(settings: &Settings, deadline: Deadline) -> BwCli {
    let client = BwCli::new(&settings.bw_binary).with_deadline(deadline);
    match &settings.appdata_dir {
        Some(dir) => client.with_appdata_dir(dir),
        None => client,
    }
}

/// Get the backup passphrase, trying in order:
/// 1. `--passphrase` (or `PORTWARDEN_PASSPHRASE`, which clap folds in)
/// 2. Interactive prompt, with confirmation when `confirm` is set
///
/// Returns `Zeroizing<String>` so the passphrase is wiped from memory on drop.
pub fn resolve_passphrase(cli: &Cli, confirm: bool) -> Result<Zeroizing<String>> {
    if let Some(pass) = &cli.passphrase {
        return non_empty(pass.clone());
    }

    if !console::Term::stderr().is_term() {
        return Err(PortwardenError::NoPassphraseProvided);
    }

    let mut prompt = dialoguer::Password::new().with_prompt("Backup passphrase");
    if confirm {
        prompt = prompt.with_confirmation(
            "Confirm backup passphrase",
            "Passphrases do not match, try again",
        );
    }
    let pass = prompt
        .interact()
        .map_err(|e| PortwardenError::CommandFailed(format!("passphrase prompt: {e}")))?;
    non_empty(pass)
}

fn non_empty(pass: String) -> Result<Zeroizing<String>> {
    let pass = Zeroizing::new(pass);
    if pass.is_empty() {
        return Err(PortwardenError::NoPassphraseProvided);
    }
    Ok(pass)
}

/// Get a vault session, trying in order:
/// 1. `BW_SESSION` environment variable
/// 2. `bw unlock`
/// 3. `bw login` (with `--email` non-interactively, otherwise interactive)
pub fn acquire_session(cli: &Cli, client: &BwCli) -> Result<SessionToken> {
    if let Some(token) = session_from_env(std::env::var(SESSION_ENV).ok()) {
        tracing::debug!("using session from {SESSION_ENV}");
        return Ok(token);
    }

    let result = match client.unlock() {
        Err(PortwardenError::NotLoggedIn) => {
            output::info("Not logged in to the vault, logging in.");
            login(cli, client)
        }
        other => other,
    };

    result.inspect_err(|e| {
        if e.to_string().contains(INVALID_MASTER_PASSWORD) {
            output::tip("Check the master password of the vault account.");
        }
    })
}

fn login(cli: &Cli, client: &BwCli) -> Result<SessionToken> {
    let Some(email) = &cli.email else {
        return client.login_interactive();
    };

    let password = master_password()?;
    let credentials = LoginCredentials {
        email: email.clone(),
        password: password.to_string(),
        method: cli.method,
        code: cli.code.clone().unwrap_or_default(),
    };
    client.login(&credentials)
}

fn master_password() -> Result<Zeroizing<String>> {
    if let Ok(pw) = std::env::var(MASTER_PASSWORD_ENV) {
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }
    let pw = dialoguer::Password::new()
        .with_prompt("Master password")
        .interact()
        .map_err(|e| PortwardenError::CommandFailed(format!("password prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

/// A non-blank `BW_SESSION` value as a session token.
pub fn session_from_env(value: Option<String>) -> Option<SessionToken> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(SessionToken::new)
}

/// Log out unless `--no-logout` was given.  A failed logout only warns.
pub fn finish_session(cli: &Cli, client: &dyn VaultClient) {
    if cli.no_logout {
        return;
    }
    if let Err(e) = client.logout() {
        output::warning(&format!("Logout failed: {e}"));
    }
}
