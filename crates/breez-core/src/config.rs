//! Process configuration read from the environment

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use zeroize::Zeroizing;

use crate::error::ConfigError;
use crate::session::{
    SessionSettings, DEFAULT_POLL_INTERVAL, DEFAULT_READINESS_TIMEOUT, DEFAULT_WORKING_DIR,
};
use crate::vault::{SecretVault, VaultKey, DEFAULT_VAULT_FILE};

/// Vault encryption key, 64 hex characters
pub const ENV_ENCRYPTION_KEY: &str = "ENCRYPTION_KEY";
/// API key written into a newly generated vault
pub const ENV_API_KEY: &str = "BREEZ_API_KEY";
/// SDK working directory
pub const ENV_WORKDIR: &str = "BREEZ_WORKDIR";
/// `production` selects quieter logging
pub const ENV_MODE: &str = "BREEZ_ENV";
/// Vault file override
pub const ENV_VAULT_PATH: &str = "BREEZ_VAULT_PATH";
/// Readiness wait cap in seconds
pub const ENV_READINESS_TIMEOUT: &str = "BREEZ_READINESS_TIMEOUT_SECS";

/// Settings for one server process
#[derive(Clone)]
pub struct AppConfig {
    encryption_key: Zeroizing<String>,

    /// API key for first-run vault generation
    pub api_key: Option<String>,

    /// SDK working directory
    pub working_dir: PathBuf,

    /// Encrypted vault file
    pub vault_path: PathBuf,

    /// Whether `BREEZ_ENV=production`
    pub production: bool,

    /// Upper bound on the readiness wait
    pub readiness_timeout: Duration,
}

impl AppConfig {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`, which returns a variable's value if set
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let encryption_key =
            Zeroizing::new(get(ENV_ENCRYPTION_KEY).ok_or(ConfigError::MissingKey)?);
        // Fail at startup rather than on the first tool call
        VaultKey::from_hex(&encryption_key)?;

        let readiness_timeout = match get(ENV_READINESS_TIMEOUT) {
            Some(raw) => parse_timeout(&raw)?,
            None => DEFAULT_READINESS_TIMEOUT,
        };

        Ok(Self {
            encryption_key,
            api_key: get(ENV_API_KEY),
            working_dir: get(ENV_WORKDIR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_WORKING_DIR)),
            vault_path: get(ENV_VAULT_PATH)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_VAULT_FILE)),
            production: get(ENV_MODE).is_some_and(|mode| mode.eq_ignore_ascii_case("production")),
            readiness_timeout,
        })
    }

    /// Replace the vault path, e.g. from a command-line flag
    pub fn with_vault_path(mut self, path: impl AsRef<Path>) -> Self {
        self.vault_path = path.as_ref().to_path_buf();
        self
    }

    /// Default log filter directive for this mode
    pub fn default_log_level(&self) -> &'static str {
        if self.production {
            "info"
        } else {
            "debug"
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            working_dir: self.working_dir.clone(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            readiness_timeout: self.readiness_timeout,
        }
    }

    /// Build the secret vault. No file I/O happens here.
    pub fn open_vault(&self) -> Result<SecretVault, ConfigError> {
        Ok(SecretVault::new(&self.encryption_key, &self.vault_path)?
            .with_api_key(self.api_key.clone()))
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("encryption_key", &"<redacted>")
            .field("has_api_key", &self.api_key.is_some())
            .field("working_dir", &self.working_dir)
            .field("vault_path", &self.vault_path)
            .field("production", &self.production)
            .field("readiness_timeout", &self.readiness_timeout)
            .finish()
    }
}

fn parse_timeout(raw: &str) -> Result<Duration, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidSetting {
        name: ENV_READINESS_TIMEOUT.to_string(),
        reason: reason.to_string(),
    };
    match raw.parse::<u64>() {
        Ok(0) => Err(invalid("must be at least 1 second")),
        Ok(secs) => Ok(Duration::from_secs(secs)),
        Err(e) => Err(invalid(&e.to_string())),
    }
}
