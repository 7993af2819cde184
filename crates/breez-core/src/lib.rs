//! Breez wallet core
//!
//! The credential vault and session lifecycle behind the Breez MCP server.
//!
//! # Components
//!
//! - [`vault::SecretVault`]: encrypted at-rest storage of the API key, the
//!   BIP-39 seed phrase and the network selector
//! - [`session::SessionManager`]: connects the wallet SDK with vault
//!   credentials and gates every operation on the SDK's first sync
//! - [`sdk`]: the capability traits the session manager drives, plus an
//!   in-memory implementation
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use breez_core::{sdk::memory::MemoryWallet, SecretVault, SessionManager, SessionSettings};
//!
//! # async fn run() -> breez_core::Result<()> {
//! let key = "00".repeat(32);
//! let vault = Arc::new(SecretVault::new(&key, "config.enc")?);
//! let session = SessionManager::new(vault, Arc::new(MemoryWallet::new()), SessionSettings::default());
//! let info = session.get_balance().await?;
//! println!("{} BTC at {}", info.balance_btc(), info.address);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod sdk;
pub mod session;
pub mod types;
pub mod vault;

pub use config::AppConfig;
pub use error::{ConfigError, Error, OperationError, Result, SessionError};
pub use session::{SessionManager, SessionSettings, SessionState};
pub use types::{
    format_btc, InvoiceResult, LnurlPayOutcome, PaymentDirection, PaymentRecord, PaymentStatus,
    SendResult, SignatureResult, SuccessActionInfo, WalletInfo,
};
pub use vault::{Network, SecretVault, VaultConfig, VaultConfigUpdate};
