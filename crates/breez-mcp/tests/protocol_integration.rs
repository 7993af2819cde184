//! Integration tests for the MCP protocol flow
//!
//! The server runs over an in-memory pipe exactly as it runs over stdio.

use std::sync::Arc;
use std::time::Duration;

use breez_core::sdk::memory::{MemoryWallet, MemoryWalletSettings};
use breez_core::{SecretVault, SessionManager, SessionSettings};
use breez_mcp::protocol::codes;
use breez_mcp::transport::LineTransport;
use breez_mcp::{McpServer, MCP_PROTOCOL_VERSION};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Client end of a running server
struct Client {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
    next_id: i64,
}

impl Client {
    async fn send(&mut self, message: Value) {
        let mut line = serde_json::to_vec(&message).unwrap();
        line.push(b'\n');
        self.writer.write_all(&line).await.unwrap();
    }

    async fn send_raw(&mut self, raw: &str) {
        self.writer.write_all(raw.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
    }

    async fn recv(&mut self) -> Value {
        let line = tokio::time::timeout(Duration::from_secs(10), self.lines.next_line())
            .await
            .expect("server did not answer in time")
            .unwrap()
            .expect("server closed the pipe");
        serde_json::from_str(&line).unwrap()
    }

    async fn request(&mut self, method: &str, params: Value) -> Value {
        self.next_id += 1;
        let id = self.next_id;
        self.send(json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}))
            .await;
        let response = self.recv().await;
        assert_eq!(response["id"], id);
        response
    }

    async fn call_tool(&mut self, name: &str, arguments: Value) -> Value {
        let response = self
            .request("tools/call", json!({"name": name, "arguments": arguments}))
            .await;
        assert!(response.get("error").is_none(), "unexpected error: {}", response);
        response["result"].clone()
    }

    async fn initialize(&mut self) {
        let response = self
            .request(
                "initialize",
                json!({
                    "protocolVersion": MCP_PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {"name": "integration-test", "version": "1.0.0"}
                }),
            )
            .await;
        assert!(response.get("error").is_none());
        self.send(json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
            .await;
    }
}

struct Harness {
    _dir: TempDir,
    client: Client,
    shutdown: watch::Sender<bool>,
    server: JoinHandle<std::io::Result<()>>,
}

fn start(settings: MemoryWalletSettings) -> Harness {
    let dir = TempDir::new().unwrap();
    let vault = SecretVault::new(&"44".repeat(32), dir.path().join("config.enc")).unwrap();
    let session = SessionManager::new(
        Arc::new(vault),
        Arc::new(MemoryWallet::with_settings(settings)),
        SessionSettings {
            working_dir: dir.path().join("data"),
            poll_interval: Duration::from_millis(20),
            readiness_timeout: Duration::from_secs(5),
        },
    );
    let server = McpServer::new(Arc::new(session));

    let (client_io, server_io) = tokio::io::duplex(64 * 1024);
    let (server_read, server_write) = tokio::io::split(server_io);
    let (client_read, client_write) = tokio::io::split(client_io);
    let (shutdown, shutdown_rx) = watch::channel(false);

    let server = tokio::spawn(async move {
        let transport = LineTransport::new(BufReader::new(server_read), server_write);
        server.run(transport, shutdown_rx).await
    });

    Harness {
        _dir: dir,
        client: Client {
            lines: BufReader::new(client_read).lines(),
            writer: client_write,
            next_id: 0,
        },
        shutdown,
        server,
    }
}

fn fast_sync() -> MemoryWalletSettings {
    MemoryWalletSettings {
        sync_delay: Some(Duration::from_millis(10)),
        ..Default::default()
    }
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_requests_before_initialized_are_rejected() {
    let mut h = start(fast_sync());

    let response = h.client.request("tools/list", json!({})).await;
    assert_eq!(response["error"]["code"], codes::NOT_INITIALIZED);

    let response = h.client.request("ping", json!({})).await;
    assert_eq!(response["result"], json!({}));
}

#[tokio::test]
async fn test_initialize_advertises_tools() {
    let mut h = start(fast_sync());

    let response = h
        .client
        .request(
            "initialize",
            json!({
                "protocolVersion": MCP_PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {"name": "integration-test"}
            }),
        )
        .await;
    let result = &response["result"];
    assert_eq!(result["protocolVersion"], MCP_PROTOCOL_VERSION);
    assert_eq!(result["capabilities"]["tools"]["listChanged"], false);
    assert!(result["capabilities"].get("resources").is_none());
    assert_eq!(result["serverInfo"]["name"], "breez-mcp");
}

#[tokio::test]
async fn test_tools_list() {
    let mut h = start(fast_sync());
    h.client.initialize().await;

    let response = h.client.request("tools/list", json!({})).await;
    let tools = response["result"]["tools"].as_array().unwrap();
    let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(
        names,
        [
            "get_balance",
            "create_invoice",
            "pay_invoice",
            "pay_lnurl",
            "list_payments",
            "sign_message",
            "verify_message"
        ]
    );

    let verify = &tools[6];
    assert_eq!(
        verify["inputSchema"]["required"],
        json!(["message", "signature", "publicKey"])
    );
}

#[tokio::test]
async fn test_unknown_method() {
    let mut h = start(fast_sync());
    h.client.initialize().await;

    let response = h.client.request("prompts/list", json!({})).await;
    assert_eq!(response["error"]["code"], codes::METHOD_NOT_FOUND);
}

#[tokio::test]
async fn test_parse_error_then_recovery() {
    let mut h = start(fast_sync());

    h.client.send_raw("{this is not json").await;
    let response = h.client.recv().await;
    assert_eq!(response["error"]["code"], codes::PARSE_ERROR);
    assert_eq!(response["id"], Value::Null);

    // Blank lines are skipped and the server keeps serving
    h.client.send_raw("").await;
    let response = h.client.request("ping", json!({})).await;
    assert!(response.get("result").is_some());
}

#[tokio::test]
async fn test_invalid_utf8_then_recovery() {
    let mut h = start(fast_sync());

    h.client.writer.write_all(&[0xff, 0xfe, b'\n']).await.unwrap();
    let response = h.client.recv().await;
    assert_eq!(response["error"]["code"], codes::PARSE_ERROR);
    assert_eq!(response["id"], Value::Null);

    let response = h.client.request("ping", json!({})).await;
    assert!(response.get("result").is_some());
}

// ============================================================================
// Tool Tests
// ============================================================================

#[tokio::test]
async fn test_get_balance_end_to_end() {
    let mut h = start(MemoryWalletSettings {
        balance_sat: 1_234_567,
        address: "tb1qexample".to_string(),
        ..fast_sync()
    });
    h.client.initialize().await;

    let result = h.client.call_tool("get_balance", json!({})).await;
    assert!(result.get("isError").is_none());
    assert_eq!(
        result["structuredContent"],
        json!({"balance": 1_234_567, "address": "tb1qexample", "balanceBTC": "0.01234567"})
    );

    let text = result["content"][0]["text"].as_str().unwrap();
    let from_text: Value = serde_json::from_str(text).unwrap();
    assert_eq!(from_text, result["structuredContent"]);
}

#[tokio::test]
async fn test_tool_errors_do_not_stop_the_server() {
    let mut h = start(fast_sync());
    h.client.initialize().await;

    let result = h.client.call_tool("launch_rockets", json!({})).await;
    assert_eq!(result["isError"], true);
    assert_eq!(result["structuredContent"]["tool"], "launch_rockets");

    let result = h.client.call_tool("pay_invoice", json!({})).await;
    assert_eq!(result["isError"], true);
    assert!(result["structuredContent"]["error"]
        .as_str()
        .unwrap()
        .contains("invoice"));

    let result = h.client.call_tool("get_balance", json!({})).await;
    assert!(result.get("isError").is_none());
}

#[tokio::test]
async fn test_invoice_round_trip() {
    let mut h = start(fast_sync());
    h.client.initialize().await;

    let created = h
        .client
        .call_tool("create_invoice", json!({"amount": 1500, "description": "Coffee"}))
        .await;
    let invoice = created["structuredContent"]["invoice"].as_str().unwrap().to_string();

    let paid = h.client.call_tool("pay_invoice", json!({"invoice": invoice})).await;
    assert_eq!(paid["structuredContent"]["status"], "completed");

    let history = h.client.call_tool("list_payments", json!({"limit": 10})).await;
    let payments = history["structuredContent"].as_array().unwrap();
    assert!(payments.iter().any(|p| p["direction"] == "outgoing" && p["amountSat"] == 1500));
}

#[tokio::test]
async fn test_sign_then_verify() {
    let mut h = start(fast_sync());
    h.client.initialize().await;

    let signed = h.client.call_tool("sign_message", json!({"message": "hello"})).await;
    let signed = &signed["structuredContent"];

    let verified = h
        .client
        .call_tool(
            "verify_message",
            json!({
                "message": "hello",
                "signature": signed["signature"],
                "publicKey": signed["publicKey"],
            }),
        )
        .await;
    assert_eq!(verified["structuredContent"]["isValid"], true);
}

#[tokio::test]
async fn test_tool_call_waits_for_sync() {
    let wallet_settings = MemoryWalletSettings {
        sync_delay: Some(Duration::from_millis(300)),
        ..Default::default()
    };
    let mut h = start(wallet_settings);
    h.client.initialize().await;

    let result = h.client.call_tool("get_balance", json!({})).await;
    assert_eq!(result["structuredContent"]["balance"], 500_000);
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn test_shutdown_signal_stops_the_loop() {
    let h = start(fast_sync());
    h.shutdown.send(true).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), h.server)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_eof_stops_the_loop() {
    let Harness {
        _dir,
        client,
        server,
        shutdown: _shutdown,
    } = start(fast_sync());
    drop(client);

    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server did not stop")
        .unwrap();
    assert!(result.is_ok());
}
