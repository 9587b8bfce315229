//! `VaultClient` implementation that shells out to the Bitwarden `bw` tool.
//!
//! Every call spawns one `bw` process and blocks until it exits.  The
//! session token is handed over in the `BW_SESSION` environment variable
//! and login passwords through `--passwordenv`, so neither shows up in
//! the process list.  If a deadline is set and passes while a child is
//! running, the child is killed and the call fails with `Cancelled`.

use std::ffi::{OsStr, OsString};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{debug, warn};

use super::client::VaultClient;
use super::session::{
    parse_raw_token, parse_session_output, LoginCredentials, SessionParse, SessionToken,
    NOT_LOGGED_IN, VAULT_IS_LOCKED,
};
use crate::deadline::Deadline;
use crate::errors::{PortwardenError, Result};

/// Environment variable `bw` reads its app-data directory from.
pub const APPDATA_ENV: &str = "BITWARDENCLI_APPDATA_DIR";

/// Environment variable `bw` reads the session key from.
pub const SESSION_ENV: &str = "BW_SESSION";

/// Environment variable used to pass the master password to `bw login`.
const PASSWORD_ENV: &str = "PORTWARDEN_BW_PASSWORD";

/// How often a running child is polled for exit / deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Client for the `bw` command-line tool.
#[derive(Debug, Clone)]
pub struct BwCli {
    binary: PathBuf,
    appdata_dir: Option<PathBuf>,
    deadline: Deadline,
}

/// Captured result of one `bw` run.
struct RunOutput {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

/// Per-call process settings.
#[derive(Default)]
struct Invocation<'a> {
    /// Attach the terminal so `bw` can prompt the operator.
    interactive: bool,
    session: Option<&'a SessionToken>,
    password: Option<&'a str>,
}

impl BwCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            appdata_dir: None,
            deadline: Deadline::none(),
        }
    }

    /// Point `bw` at a specific app-data directory.
    pub fn with_appdata_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.appdata_dir = Some(dir.into());
        self
    }

    /// Kill any in-flight call once `deadline` passes.
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn appdata_dir(&self) -> Option<&Path> {
        self.appdata_dir.as_deref()
    }

    /// Run `bw login` and let the operator answer its prompts.
    pub fn login_interactive(&self) -> Result<SessionToken> {
        let out = self.run(
            "login",
            ["login"],
            Invocation {
                interactive: true,
                ..Default::default()
            },
        )?;
        session_from_output("login", &out)
    }

    // ------------------------------------------------------------------
    // Process plumbing
    // ------------------------------------------------------------------

    fn run<I, S>(&self, label: &str, args: I, inv: Invocation<'_>) -> Result<RunOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.deadline.check()?;

        let mut cmd = Command::new(&self.binary);
        if !inv.interactive {
            cmd.arg("--nointeraction");
        }
        cmd.args(args);
        if let Some(dir) = &self.appdata_dir {
            cmd.env(APPDATA_ENV, dir);
        }
        if let Some(session) = inv.session {
            cmd.env(SESSION_ENV, session.expose());
        }
        if let Some(password) = inv.password {
            cmd.env(PASSWORD_ENV, password);
        }
        cmd.stdin(if inv.interactive {
            Stdio::inherit()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

        debug!(command = label, "running bw");
        let mut child = cmd.spawn().map_err(|e| PortwardenError::VaultClient {
            command: label.to_string(),
            message: format!("failed to start '{}': {e}", self.binary.display()),
            stdout: Vec::new(),
        })?;

        let stdout_reader = child.stdout.take().map(|r| spawn_reader(r, false));
        // Interactive prompts go to stderr, so echo it while capturing.
        let stderr_reader = child.stderr.take().map(|r| spawn_reader(r, inv.interactive));

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if self.deadline.is_expired() {
                let _ = child.kill();
                let _ = child.wait();
                warn!(command = label, "deadline exceeded, bw process killed");
                return Err(PortwardenError::Cancelled);
            }
            thread::sleep(POLL_INTERVAL);
        };

        Ok(RunOutput {
            status,
            stdout: join_reader(stdout_reader),
            stderr: join_reader(stderr_reader),
        })
    }

    /// Run a command that needs an unlocked session and must exit cleanly.
    fn run_with_session<I, S>(&self, label: &str, args: I, session: &SessionToken) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let out = self.run(
            label,
            args,
            Invocation {
                session: Some(session),
                ..Default::default()
            },
        )?;
        check_status(label, out)
    }
}

fn spawn_reader<R>(mut reader: R, echo: bool) -> JoinHandle<Vec<u8>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut captured = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            match reader.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if echo {
                        let mut err = std::io::stderr();
                        let _ = err.write_all(&chunk[..n]);
                        let _ = err.flush();
                    }
                    captured.extend_from_slice(&chunk[..n]);
                }
            }
        }
        captured
    })
}

fn join_reader(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// Map a non-zero exit into the matching error.
fn check_status(label: &str, out: RunOutput) -> Result<Vec<u8>> {
    if out.status.success() {
        return Ok(out.stdout);
    }
    let stderr = String::from_utf8_lossy(&out.stderr);
    let stdout_text = String::from_utf8_lossy(&out.stdout);
    if stderr.contains(VAULT_IS_LOCKED) || stdout_text.contains(VAULT_IS_LOCKED) {
        return Err(PortwardenError::VaultLocked);
    }
    if stderr.contains(NOT_LOGGED_IN) || stdout_text.contains(NOT_LOGGED_IN) {
        return Err(PortwardenError::NotLoggedIn);
    }
    let message = match stderr.trim() {
        "" => format!("exited with {}", out.status),
        text => text.to_string(),
    };
    Err(PortwardenError::VaultClient {
        command: label.to_string(),
        message,
        stdout: out.stdout,
    })
}

fn session_from_output(label: &str, out: &RunOutput) -> Result<SessionToken> {
    let mut text = String::from_utf8_lossy(&out.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&out.stderr));
    match parse_session_output(&text) {
        SessionParse::Token(token) => Ok(token),
        SessionParse::LoginRequired => Err(PortwardenError::NotLoggedIn),
        SessionParse::NotFound => Err(PortwardenError::SessionKeyExtractionFailed(format!(
            "`bw {label}` printed no BW_SESSION line ({})",
            out.status
        ))),
    }
}

fn with_trailing_separator(dir: &Path) -> OsString {
    let mut s = dir.as_os_str().to_os_string();
    if !dir.as_os_str().is_empty() && !s.to_string_lossy().ends_with(std::path::MAIN_SEPARATOR) {
        s.push(std::path::MAIN_SEPARATOR_STR);
    }
    s
}

impl VaultClient for BwCli {
    fn unlock(&self) -> Result<SessionToken> {
        let out = self.run(
            "unlock",
            ["unlock"],
            Invocation {
                interactive: true,
                ..Default::default()
            },
        )?;
        session_from_output("unlock", &out)
    }

    fn login(&self, credentials: &LoginCredentials) -> Result<SessionToken> {
        let mut args: Vec<OsString> = vec![
            "login".into(),
            credentials.email.as_str().into(),
            "--passwordenv".into(),
            PASSWORD_ENV.into(),
        ];
        if let Some(code) = credentials.method.code() {
            args.push("--method".into());
            args.push(code.to_string().into());
            args.push("--code".into());
            args.push(credentials.code.as_str().into());
        }
        args.push("--raw".into());

        let out = self.run(
            "login",
            args,
            Invocation {
                password: Some(&credentials.password),
                ..Default::default()
            },
        )?;
        let stdout = check_status("login", out)?;
        parse_raw_token(&String::from_utf8_lossy(&stdout)).ok_or_else(|| {
            PortwardenError::SessionKeyExtractionFailed("`bw login --raw` printed no token".into())
        })
    }

    fn list_items(&self, session: &SessionToken) -> Result<Vec<u8>> {
        self.run_with_session("list items", ["list", "items"], session)
    }

    fn list_folders(&self, session: &SessionToken) -> Result<Vec<u8>> {
        self.run_with_session("list folders", ["list", "folders"], session)
    }

    fn get_attachment(
        &self,
        item_id: &str,
        attachment_id: &str,
        session: &SessionToken,
        output_dir: &Path,
    ) -> Result<()> {
        let args: [OsString; 7] = [
            "get".into(),
            "attachment".into(),
            attachment_id.into(),
            "--itemid".into(),
            item_id.into(),
            "--output".into(),
            with_trailing_separator(output_dir),
        ];
        self.run_with_session("get attachment", args, session)?;
        Ok(())
    }

    fn create_folder(&self, session: &SessionToken, folder_json: &[u8]) -> Result<Vec<u8>> {
        let encoded = BASE64.encode(folder_json);
        self.run_with_session("create folder", ["create", "folder", encoded.as_str()], session)
    }

    fn create_item(&self, session: &SessionToken, item_json: &[u8]) -> Result<Vec<u8>> {
        let encoded = BASE64.encode(item_json);
        self.run_with_session("create item", ["create", "item", encoded.as_str()], session)
    }

    fn create_attachment(
        &self,
        item_id: &str,
        session: &SessionToken,
        file_path: &Path,
    ) -> Result<()> {
        let args: [OsString; 6] = [
            "create".into(),
            "attachment".into(),
            "--itemid".into(),
            item_id.into(),
            "--file".into(),
            file_path.as_os_str().to_os_string(),
        ];
        self.run_with_session("create attachment", args, session)?;
        Ok(())
    }

    fn logout(&self) -> Result<()> {
        let out = self.run("logout", ["logout"], Invocation::default())?;
        check_status("logout", out)?;
        Ok(())
    }
}
