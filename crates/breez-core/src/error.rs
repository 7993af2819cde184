//! Error types for the Breez wallet core

use std::time::Duration;
use thiserror::Error;

/// Result type alias for wallet core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Credential and vault errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// ENCRYPTION_KEY is not set
    #[error("ENCRYPTION_KEY environment variable is required")]
    MissingKey,

    /// Key material is not 32 bytes of hex
    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    /// Vault file exists but cannot be decoded or authenticated
    #[error("Vault file is corrupt or was encrypted with a different key: {0}")]
    CorruptFile(String),

    /// `update` called before a successful `load`
    #[error("Vault not loaded. Call load() first.")]
    NotLoaded,

    /// Environment or CLI setting has an unusable value
    #[error("Invalid value for {name}: {reason}")]
    InvalidSetting { name: String, reason: String },

    /// Seed phrase is not valid BIP-39
    #[error("Invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Serialization(e.to_string())
    }
}

/// Session lifecycle errors
#[derive(Debug, Error)]
pub enum SessionError {
    /// The SDK connect call failed; the next call retries
    #[error("Failed to connect wallet SDK: {0}")]
    ConnectFailed(String),

    /// The SDK did not emit its first sync in time
    #[error("Wallet did not become ready within {0:?}")]
    ReadinessTimeout(Duration),

    /// The wait was cancelled by shutdown
    #[error("Readiness wait cancelled")]
    Cancelled,

    /// Vault could not provide credentials
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failures from wallet capability calls
#[derive(Debug, Error)]
pub enum OperationError {
    /// Error reported by the wallet SDK
    #[error("{0}")]
    Sdk(String),

    /// Destination could not be classified as a payable target
    #[error("Unsupported payment destination: {0}")]
    UnsupportedDestination(String),

    /// LNURL success action carried an unusable URL
    #[error("Invalid LNURL success action: {0}")]
    InvalidSuccessAction(String),

    /// Argument rejected before reaching the SDK
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Top-level error for the wallet core
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Operation(#[from] OperationError),
}

impl Error {
    /// Whether the error must stop the process
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}
