//! Initialization and cancellation messages

use serde::{Deserialize, Serialize};

use super::capabilities::{ClientCapabilities, ClientInfo, ServerCapabilities, ServerInfo};
use super::jsonrpc::RequestId;

/// `initialize` request parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: ClientCapabilities,
    pub client_info: ClientInfo,
}

/// `initialize` result
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    pub server_info: ServerInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

impl InitializeResult {
    pub fn new(protocol_version: String) -> Self {
        Self {
            protocol_version,
            capabilities: ServerCapabilities::default(),
            server_info: ServerInfo::default(),
            instructions: Some(
                "Breez wallet server for Lightning and Liquid payments. Amounts are in \
                 satoshis. Use get_balance before sending to check available funds."
                    .to_string(),
            ),
        }
    }
}

/// `notifications/cancelled` parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelledNotification {
    pub request_id: RequestId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}
