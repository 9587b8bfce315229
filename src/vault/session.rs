//! Session tokens, login credentials, and parsing of `bw` session output.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// Message printed by `bw` when no account is logged in.
pub const NOT_LOGGED_IN: &str = "You are not logged in.";

/// Message printed by `bw` when a master password is rejected.
pub const INVALID_MASTER_PASSWORD: &str = "Invalid master password.";

/// Message printed by `bw` when the vault has to be unlocked first.
pub const VAULT_IS_LOCKED: &str = "Vault is locked.";

/// Opaque session token issued by the vault after unlock or login.
///
/// Zeroed on drop; `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Two-step login method accepted by `bw login --method`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum LoginMethod {
    #[default]
    None,
    Authenticator,
    Email,
    Yubikey,
}

impl LoginMethod {
    /// The numeric code `bw` expects, `None` when no method flag is sent.
    pub fn code(self) -> Option<i32> {
        match self {
            LoginMethod::None => None,
            LoginMethod::Authenticator => Some(0),
            LoginMethod::Email => Some(1),
            LoginMethod::Yubikey => Some(3),
        }
    }
}

impl From<LoginMethod> for i32 {
    fn from(m: LoginMethod) -> i32 {
        m.code().unwrap_or(100)
    }
}

impl TryFrom<i32> for LoginMethod {
    type Error = String;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            100 => Ok(LoginMethod::None),
            0 => Ok(LoginMethod::Authenticator),
            1 => Ok(LoginMethod::Email),
            3 => Ok(LoginMethod::Yubikey),
            other => Err(format!("unknown login method {other}")),
        }
    }
}

/// Credentials for a non-interactive `bw login`.
#[derive(Clone, Serialize, Deserialize, Zeroize)]
#[zeroize(drop)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
    #[zeroize(skip)]
    #[serde(default)]
    pub method: LoginMethod,
    #[serde(default)]
    pub code: String,
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("email", &self.email)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

/// Outcome of scanning `bw unlock` / `bw login` output for a session key.
#[derive(Debug, PartialEq, Eq)]
pub enum SessionParse {
    Token(SessionToken),
    LoginRequired,
    NotFound,
}

fn session_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"BW_SESSION="([^"]+)""#).expect("static regex is valid"))
}

/// Find the `BW_SESSION="..."` export line in free-form tool output.
pub fn parse_session_output(output: &str) -> SessionParse {
    if let Some(caps) = session_regex().captures(output) {
        return SessionParse::Token(SessionToken::new(&caps[1]));
    }
    if output.contains(NOT_LOGGED_IN) {
        return SessionParse::LoginRequired;
    }
    SessionParse::NotFound
}

/// Parse the output of a `--raw` command, which is just the token.
pub fn parse_raw_token(output: &str) -> Option<SessionToken> {
    let token = output.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        None
    } else {
        Some(SessionToken::new(token))
    }
}
