//! MCP Server implementation
//!
//! Reads one message at a time from the transport, dispatches it, and
//! writes the response before reading the next.

use std::io;
use std::sync::Arc;

use breez_core::SessionManager;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::{watch, RwLock};
use tracing::{debug, error, info, warn};

use crate::handlers::{handle_notification, handle_request, McpServerState};
use crate::protocol::{
    JsonRpcError, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, RequestId,
};
use crate::transport::{AsyncStdioTransport, LineTransport};

/// MCP Server
pub struct McpServer {
    state: RwLock<McpServerState>,
}

impl McpServer {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self {
            state: RwLock::new(McpServerState::new(session)),
        }
    }

    /// Whether the client has completed the initialize handshake
    pub async fn is_initialized(&self) -> bool {
        self.state.read().await.initialized
    }

    /// Run the server using stdio transport
    pub async fn run_stdio(&self, shutdown: watch::Receiver<bool>) -> io::Result<()> {
        info!("Starting Breez MCP server (stdio transport)");
        self.run(AsyncStdioTransport::stdio(), shutdown).await
    }

    /// Serve until EOF or until `shutdown` turns `true`
    pub async fn run<R, W>(
        &self,
        mut transport: LineTransport<R, W>,
        mut shutdown: watch::Receiver<bool>,
    ) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        loop {
            if *shutdown.borrow() {
                info!("Shutdown requested, stopping server");
                break;
            }

            let message = tokio::select! {
                read = transport.read_message() => match read {
                    Ok(Some(message)) => message,
                    Ok(None) => {
                        info!("EOF received, shutting down");
                        break;
                    }
                    // The offending line is already consumed, so the stream stays usable
                    Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                        warn!("Discarding unreadable message: {}", e);
                        let response = JsonRpcResponse::error(RequestId::Null, JsonRpcError::parse_error());
                        if let Err(e) = transport.write_response(&response).await {
                            error!("Failed to write response: {}", e);
                            return Err(e);
                        }
                        continue;
                    }
                    Err(e) => {
                        error!("Error reading message: {}", e);
                        return Err(e);
                    }
                },
                Ok(()) = shutdown.changed() => continue,
            };

            if let Some(response) = self.handle_message(&message).await {
                if let Err(e) = transport.write_response(&response).await {
                    error!("Failed to write response: {}", e);
                    return Err(e);
                }
            }
        }

        info!("Breez MCP server stopped");
        Ok(())
    }

    /// Classify and handle one raw message; returns the response to send, if any
    pub async fn handle_message(&self, message: &str) -> Option<JsonRpcResponse> {
        let json: Value = match serde_json::from_str(message) {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to parse JSON: {}", e);
                return Some(JsonRpcResponse::error(
                    RequestId::Null,
                    JsonRpcError::parse_error(),
                ));
            }
        };

        let has_id = json.get("id").is_some();
        let has_method = json.get("method").is_some();

        if has_id && has_method {
            let id = json
                .get("id")
                .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok())
                .unwrap_or(RequestId::Null);
            let request: JsonRpcRequest = match serde_json::from_value(json) {
                Ok(r) => r,
                Err(e) => {
                    warn!("Malformed request: {}", e);
                    return Some(JsonRpcResponse::error(
                        id,
                        JsonRpcError::invalid_request(e.to_string()),
                    ));
                }
            };

            let mut state = self.state.write().await;
            Some(handle_request(&mut state, &request).await)
        } else if has_method {
            match serde_json::from_value::<JsonRpcNotification>(json) {
                Ok(notification) => {
                    let mut state = self.state.write().await;
                    handle_notification(&mut state, &notification);
                }
                Err(e) => warn!("Malformed notification: {}", e),
            }
            None
        } else if has_id && (json.get("result").is_some() || json.get("error").is_some()) {
            // The server never issues requests of its own
            debug!("Ignoring response from client");
            None
        } else {
            warn!("Unknown message type: {}", json);
            Some(JsonRpcResponse::error(
                RequestId::Null,
                JsonRpcError::invalid_request("not a request or notification"),
            ))
        }
    }
}
