//! Breez MCP Server
//!
//! Serves wallet tools over stdio. Stdout carries the protocol; all logs go
//! to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use breez_core::sdk::memory::MemoryWallet;
use breez_core::sdk::WalletConnector;
use breez_core::{AppConfig, SessionManager};
use breez_mcp::McpServer;

/// Breez MCP Server - Lightning wallet tools for AI agents
#[derive(Parser, Debug)]
#[command(name = "breez-mcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level; RUST_LOG takes precedence, BREEZ_ENV picks the default
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,

    /// Encrypted credential file
    #[arg(long, env = "BREEZ_VAULT_PATH")]
    vault_path: Option<PathBuf>,

    /// Wallet backend
    #[arg(long, value_enum, default_value = "memory")]
    backend: Backend,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    /// In-process wallet with simulated balance and payments
    Memory,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv().ok();
    let args = Args::parse();
    let config = AppConfig::from_env();

    let default_level = match (&args.log_level, &config) {
        (Some(level), _) => level.as_str(),
        (None, Ok(config)) => config.default_log_level(),
        (None, Err(_)) => "info",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Stdout is reserved for the protocol
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {}", e))?;

    info!("Breez MCP Server v{} starting", env!("CARGO_PKG_VERSION"));
    if let Some(path) = dotenv {
        debug!("Loaded environment from {}", path.display());
    }

    let mut config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            eprintln!("Configuration error: {}", e);
            eprintln!("Set ENCRYPTION_KEY to 64 hex characters (32 bytes), e.g. `openssl rand -hex 32`");
            std::process::exit(1);
        }
    };
    if let Some(path) = args.vault_path {
        config = config.with_vault_path(path);
    }
    debug!("{:?}", config);

    let vault = Arc::new(config.open_vault().context("opening vault")?);
    if let Err(e) = vault.load().await {
        error!("Failed to load vault {}: {}", vault.path().display(), e);
        eprintln!("Failed to load vault {}: {}", vault.path().display(), e);
        std::process::exit(1);
    }

    let connector: Arc<dyn WalletConnector> = match args.backend {
        Backend::Memory => {
            info!("Using in-memory wallet backend");
            Arc::new(MemoryWallet::new())
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let session = Arc::new(SessionManager::with_shutdown(
        vault,
        connector,
        config.session_settings(),
        shutdown_rx.clone(),
    ));

    tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.warm_up().await }
    });
    tokio::spawn(shutdown_signal(shutdown_tx));

    McpServer::new(session)
        .run_stdio(shutdown_rx)
        .await
        .context("stdio transport failed")?;

    Ok(())
}

/// Flip the shutdown channel on SIGINT or SIGTERM
async fn shutdown_signal(shutdown: watch::Sender<bool>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }

    let _ = shutdown.send(true);
}
