//! MCP request handlers

use std::sync::Arc;

use breez_core::SessionManager;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::invariants::{validate_request, validate_request_id};
use crate::protocol::*;
use crate::tools::{self, ToolContext};

/// MCP Server state
pub struct McpServerState {
    /// Protocol version negotiated
    pub protocol_version: Option<String>,

    /// Set by `notifications/initialized`
    pub initialized: bool,

    pub client_info: Option<ClientInfo>,

    tools: ToolContext,
}

impl McpServerState {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self {
            protocol_version: None,
            initialized: false,
            client_info: None,
            tools: ToolContext::new(session),
        }
    }

    pub fn tool_context(&self) -> &ToolContext {
        &self.tools
    }
}

/// Handle an incoming JSON-RPC request
pub async fn handle_request(state: &mut McpServerState, request: &JsonRpcRequest) -> JsonRpcResponse {
    debug!("Handling request: {} (id: {})", request.method, request.id);

    if let Err(error) = validate_request(request).and_then(|_| validate_request_id(&request.id)) {
        return JsonRpcResponse::error(request.id.clone(), error);
    }

    if !state.initialized && request.method != "initialize" && request.method != "ping" {
        return JsonRpcResponse::error(request.id.clone(), JsonRpcError::not_initialized());
    }

    let result = match request.method.as_str() {
        "initialize" => handle_initialize(state, request),
        "ping" => Ok(serde_json::json!({})),
        "tools/list" => handle_tools_list(request),
        "tools/call" => handle_tools_call(state, request).await,
        _ => Err(JsonRpcError::method_not_found(&request.method)),
    };

    match result {
        Ok(value) => JsonRpcResponse::success(request.id.clone(), value),
        Err(error) => JsonRpcResponse::error(request.id.clone(), error),
    }
}

/// Handle an incoming notification
pub fn handle_notification(state: &mut McpServerState, notification: &JsonRpcNotification) {
    debug!("Handling notification: {}", notification.method);

    match notification.method.as_str() {
        "notifications/initialized" => {
            info!("Client sent initialized notification");
            state.initialized = true;
        }
        "notifications/cancelled" => {
            // Requests run to completion; the cancellation is only recorded
            match optional_params::<CancelledNotification>(notification.params.as_ref()) {
                Ok(Some(cancelled)) => warn!(
                    "Client cancelled request {}: {}",
                    cancelled.request_id,
                    cancelled.reason.as_deref().unwrap_or("no reason given")
                ),
                _ => warn!("Malformed cancellation notification"),
            }
        }
        other => debug!("Unknown notification: {}", other),
    }
}

fn required_params<T: DeserializeOwned>(params: Option<&Value>) -> Result<T, JsonRpcError> {
    let params = params.ok_or_else(|| JsonRpcError::invalid_params("Missing params"))?;
    serde_json::from_value(params.clone())
        .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {}", e)))
}

fn optional_params<T: DeserializeOwned>(params: Option<&Value>) -> Result<Option<T>, JsonRpcError> {
    params
        .map(|p| serde_json::from_value(p.clone()))
        .transpose()
        .map_err(|e| JsonRpcError::invalid_params(format!("Invalid params: {}", e)))
}

// ============================================================================
// Lifecycle Handlers
// ============================================================================

fn handle_initialize(
    state: &mut McpServerState,
    request: &JsonRpcRequest,
) -> Result<Value, JsonRpcError> {
    let params: InitializeParams = required_params(request.params.as_ref())?;

    info!(
        "Initialize request from {} (version: {})",
        params.client_info.name, params.protocol_version
    );

    if params.protocol_version != MCP_PROTOCOL_VERSION {
        // Older clients still speak the subset this server uses
        warn!(
            "Protocol version mismatch: client={}, server={}",
            params.protocol_version, MCP_PROTOCOL_VERSION
        );
    }

    state.protocol_version = Some(params.protocol_version);
    state.client_info = Some(params.client_info);

    let result = InitializeResult::new(MCP_PROTOCOL_VERSION.to_string());
    serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

// ============================================================================
// Tools Handlers
// ============================================================================

fn handle_tools_list(request: &JsonRpcRequest) -> Result<Value, JsonRpcError> {
    let _params: ToolsListParams =
        optional_params(request.params.as_ref())?.unwrap_or_default();

    let result = ToolsListResult {
        tools: tools::get_all_tools(),
        next_cursor: None,
    };
    serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

async fn handle_tools_call(
    state: &McpServerState,
    request: &JsonRpcRequest,
) -> Result<Value, JsonRpcError> {
    let params: ToolsCallParams = required_params(request.params.as_ref())?;
    info!("Tool call: {}", params.name);

    let result = tools::execute_tool(state.tool_context(), &params.name, params.arguments).await;
    serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use breez_core::sdk::memory::{MemoryWallet, MemoryWalletSettings};
    use breez_core::{SecretVault, SessionSettings};
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_state() -> (TempDir, McpServerState) {
        let dir = TempDir::new().unwrap();
        let vault = SecretVault::new(&"22".repeat(32), dir.path().join("config.enc")).unwrap();
        let wallet = MemoryWallet::with_settings(MemoryWalletSettings {
            sync_delay: Some(Duration::ZERO),
            ..Default::default()
        });
        let session = SessionManager::new(
            Arc::new(vault),
            Arc::new(wallet),
            SessionSettings {
                working_dir: dir.path().join("data"),
                ..Default::default()
            },
        );
        (dir, McpServerState::new(Arc::new(session)))
    }

    fn initialize_request() -> JsonRpcRequest {
        JsonRpcRequest::new(1, "initialize").with_params(json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {"name": "test-client", "version": "1.0.0"}
        }))
    }

    #[tokio::test]
    async fn test_requests_gated_until_initialized() {
        let (_dir, mut state) = test_state();
        let response = handle_request(&mut state, &JsonRpcRequest::new(2, "tools/list")).await;
        assert_eq!(response.error.unwrap().code, codes::NOT_INITIALIZED);
    }

    #[tokio::test]
    async fn test_ping_before_initialize() {
        let (_dir, mut state) = test_state();
        let response = handle_request(&mut state, &JsonRpcRequest::new(1, "ping")).await;
        assert_eq!(response.result, Some(json!({})));
    }

    #[tokio::test]
    async fn test_initialize_flow() {
        let (_dir, mut state) = test_state();
        let response = handle_request(&mut state, &initialize_request()).await;
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], "breez-mcp");
        assert!(!state.initialized);
        assert_eq!(state.client_info.as_ref().unwrap().name, "test-client");

        handle_notification(&mut state, &JsonRpcNotification::new("notifications/initialized"));
        assert!(state.initialized);

        let response = handle_request(&mut state, &JsonRpcRequest::new(2, "tools/list")).await;
        let tools = &response.result.unwrap()["tools"];
        assert_eq!(tools.as_array().unwrap().len(), tools::TOOLS.len());
    }

    #[tokio::test]
    async fn test_initialize_requires_params() {
        let (_dir, mut state) = test_state();
        let response = handle_request(&mut state, &JsonRpcRequest::new(1, "initialize")).await;
        assert_eq!(response.error.unwrap().code, codes::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let (_dir, mut state) = test_state();
        state.initialized = true;
        let response =
            handle_request(&mut state, &JsonRpcRequest::new(3, "resources/list")).await;
        assert_eq!(response.error.unwrap().code, codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_reserved_method_is_invalid_request() {
        let (_dir, mut state) = test_state();
        state.initialized = true;
        let response = handle_request(&mut state, &JsonRpcRequest::new(3, "rpc.ping")).await;
        assert_eq!(response.error.unwrap().code, codes::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_tools_call_error_is_a_result() {
        let (_dir, mut state) = test_state();
        state.initialized = true;
        let request = JsonRpcRequest::new(4, "tools/call")
            .with_params(json!({"name": "create_invoice", "arguments": {"amount": "ten"}}));

        let response = handle_request(&mut state, &request).await;
        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        assert_eq!(result["structuredContent"]["tool"], "create_invoice");
    }

    #[tokio::test]
    async fn test_cancelled_notification_is_ignored() {
        let (_dir, mut state) = test_state();
        let notification = JsonRpcNotification::new("notifications/cancelled")
            .with_params(json!({"requestId": 9}));
        handle_notification(&mut state, &notification);
        assert!(!state.initialized);
    }
}
