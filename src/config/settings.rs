use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::backup::lock::SessionLock;
use crate::backup::throttle::DEFAULT_SLEEP_MILLISECONDS;
use crate::errors::{PortwardenError, Result};

/// Tool configuration, loaded from `.portwarden.toml`.
///
/// Every field has a sensible default so Portwarden works out-of-the-box
/// without any config file at all.  Command-line flags win over the file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path or name of the Bitwarden CLI binary.
    #[serde(default = "default_bw_binary")]
    pub bw_binary: String,

    /// Pause between successive vault calls, in milliseconds.
    #[serde(default = "default_sleep_milliseconds")]
    pub sleep_milliseconds: u64,

    /// Overall deadline for one run in seconds (0 = no deadline).
    #[serde(default)]
    pub timeout_seconds: u64,

    /// Directory staging directories are created in.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Host-wide session lock file.
    #[serde(default = "SessionLock::default_path")]
    pub lock_file: PathBuf,

    /// App-data directory handed to `bw` as `BITWARDENCLI_APPDATA_DIR`.
    #[serde(default)]
    pub appdata_dir: Option<PathBuf>,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_bw_binary() -> String {
    "bw".to_string()
}

fn default_sleep_milliseconds() -> u64 {
    DEFAULT_SLEEP_MILLISECONDS
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            bw_binary: default_bw_binary(),
            sleep_milliseconds: default_sleep_milliseconds(),
            timeout_seconds: 0,
            work_dir: default_work_dir(),
            lock_file: SessionLock::default_path(),
            appdata_dir: None,
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the working directory.
    const FILE_NAME: &'static str = ".portwarden.toml";

    /// Load settings from `<dir>/.portwarden.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            PortwardenError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        Ok(settings)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_sensible() {
        let s = Settings::default();
        assert_eq!(s.bw_binary, "bw");
        assert_eq!(s.sleep_milliseconds, 300);
        assert_eq!(s.timeout_seconds, 0);
        assert_eq!(s.work_dir, PathBuf::from("."));
        assert!(s.lock_file.ends_with("portwarden.lock"));
        assert!(s.appdata_dir.is_none());
    }

    #[test]
    fn load_returns_defaults_when_no_config_file() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.bw_binary, "bw");
    }

    #[test]
    fn load_parses_toml_file() {
        let tmp = TempDir::new().unwrap();
        let config = r#"
bw_binary = "/opt/bw/bin/bw"
sleep_milliseconds = 1000
timeout_seconds = 600
work_dir = "/var/tmp/portwarden"
lock_file = "/run/portwarden.lock"
appdata_dir = "/var/lib/portwarden/bw"
"#;
        fs::write(tmp.path().join(".portwarden.toml"), config).unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.bw_binary, "/opt/bw/bin/bw");
        assert_eq!(settings.sleep_milliseconds, 1000);
        assert_eq!(settings.timeout_seconds, 600);
        assert_eq!(settings.work_dir, PathBuf::from("/var/tmp/portwarden"));
        assert_eq!(settings.lock_file, PathBuf::from("/run/portwarden.lock"));
        assert_eq!(
            settings.appdata_dir,
            Some(PathBuf::from("/var/lib/portwarden/bw"))
        );
    }

    #[test]
    fn load_uses_defaults_for_missing_fields() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".portwarden.toml"), "sleep_milliseconds = 0\n").unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.sleep_milliseconds, 0);
        // Rest should be defaults
        assert_eq!(settings.bw_binary, "bw");
        assert_eq!(settings.timeout_seconds, 0);
    }

    #[test]
    fn load_errors_on_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".portwarden.toml"), "not valid {{toml").unwrap();

        let result = Settings::load(tmp.path());
        assert!(matches!(result, Err(PortwardenError::ConfigError(_))));
    }
}
