//! Breez MCP Server
//!
//! A Model Context Protocol server that lets an AI agent drive a Breez
//! Lightning/Liquid wallet: read the balance, create and pay invoices, pay
//! LNURL endpoints, list payments, and sign or verify messages.
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use breez_core::{sdk::memory::MemoryWallet, SecretVault, SessionManager, SessionSettings};
//! use breez_mcp::McpServer;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let vault = Arc::new(SecretVault::new(&"00".repeat(32), "config.enc")?);
//! let session = SessionManager::new(vault, Arc::new(MemoryWallet::new()), SessionSettings::default());
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//! McpServer::new(Arc::new(session)).run_stdio(shutdown_rx).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Protocol Version
//!
//! This implementation targets MCP version 2025-11-25 over stdio.

pub mod handlers;
pub mod invariants;
pub mod protocol;
pub mod server;
pub mod tools;
pub mod transport;

pub use protocol::{
    ClientInfo, InitializeParams, InitializeResult, JsonRpcError, JsonRpcNotification,
    JsonRpcRequest, JsonRpcResponse, ServerCapabilities, ServerInfo, Tool, ToolContent,
    ToolsCallResult, MCP_PROTOCOL_VERSION,
};
pub use server::McpServer;
pub use tools::{DispatchError, ToolContext};
