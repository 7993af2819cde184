//! Breez MCP tool registry
//!
//! Every tool is a static [`ToolEntry`]: its advertised definition, the
//! argument specs its input schema is generated from, and the handler that
//! runs it. [`execute_tool`] turns every outcome into a `tools/call` result,
//! so a failing tool never takes the server down with it.

mod create_invoice;
mod get_balance;
mod list_payments;
mod pay_invoice;
mod pay_lnurl;
mod sign_message;
mod verify_message;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use breez_core::SessionManager;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::protocol::{JsonRpcError, Tool, ToolAnnotations, ToolsCallResult};

/// Tool execution context
#[derive(Clone)]
pub struct ToolContext {
    pub session: Arc<SessionManager>,
}

impl ToolContext {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }
}

/// Why a tool call did not produce a payload
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error(transparent)]
    Wallet(#[from] breez_core::Error),
}

impl From<JsonRpcError> for DispatchError {
    fn from(e: JsonRpcError) -> Self {
        DispatchError::InvalidArguments(e.message)
    }
}

/// JSON type of a tool argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Number,
    String,
}

impl ArgKind {
    fn json_type(self) -> &'static str {
        match self {
            ArgKind::Number => "number",
            ArgKind::String => "string",
        }
    }
}

/// One named tool argument
#[derive(Debug, Clone, Copy)]
pub struct ArgSpec {
    pub name: &'static str,
    pub kind: ArgKind,
    pub required: bool,
    pub description: &'static str,
}

impl ArgSpec {
    pub const fn required(name: &'static str, kind: ArgKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: true,
            description,
        }
    }

    pub const fn optional(name: &'static str, kind: ArgKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            required: false,
            description,
        }
    }
}

/// Behavior hints advertised with a tool
#[derive(Debug, Clone, Copy)]
pub struct Hints {
    pub read_only: bool,
    pub destructive: bool,
    pub idempotent: bool,
    pub open_world: bool,
}

impl Hints {
    /// Reads wallet state without changing it
    pub const READ: Hints = Hints {
        read_only: true,
        destructive: false,
        idempotent: true,
        open_world: false,
    };

    /// Moves funds
    pub const SPEND: Hints = Hints {
        read_only: false,
        destructive: true,
        idempotent: false,
        open_world: true,
    };
}

impl From<Hints> for ToolAnnotations {
    fn from(hints: Hints) -> Self {
        ToolAnnotations {
            read_only_hint: Some(hints.read_only),
            destructive_hint: Some(hints.destructive),
            idempotent_hint: Some(hints.idempotent),
            open_world_hint: Some(hints.open_world),
        }
    }
}

pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, DispatchError>> + Send + 'a>>;

pub type ToolHandler = for<'a> fn(&'a ToolContext, Value) -> ToolFuture<'a>;

/// A registered tool
pub struct ToolEntry {
    pub name: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub args: &'static [ArgSpec],
    pub hints: Hints,
    pub handler: ToolHandler,
}

impl ToolEntry {
    /// The definition advertised by `tools/list`
    pub fn definition(&self) -> Tool {
        Tool {
            name: self.name.to_string(),
            title: Some(self.title.to_string()),
            description: self.description.to_string(),
            input_schema: input_schema(self.args),
            annotations: Some(self.hints.into()),
        }
    }
}

/// All tools, in advertised order
pub static TOOLS: &[ToolEntry] = &[
    get_balance::ENTRY,
    create_invoice::ENTRY,
    pay_invoice::ENTRY,
    pay_lnurl::ENTRY,
    list_payments::ENTRY,
    sign_message::ENTRY,
    verify_message::ENTRY,
];

/// Get all tool definitions
pub fn get_all_tools() -> Vec<Tool> {
    TOOLS.iter().map(ToolEntry::definition).collect()
}

pub fn find_tool(name: &str) -> Option<&'static ToolEntry> {
    TOOLS.iter().find(|entry| entry.name == name)
}

/// JSON Schema object for an argument list
pub fn input_schema(args: &[ArgSpec]) -> Value {
    let mut properties = Map::new();
    for arg in args {
        properties.insert(
            arg.name.to_string(),
            json!({
                "type": arg.kind.json_type(),
                "description": arg.description,
            }),
        );
    }

    let required: Vec<&str> = args.iter().filter(|a| a.required).map(|a| a.name).collect();

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Deserialize a tool's arguments; absent arguments read as an empty object
pub(crate) fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T, DispatchError> {
    let arguments = match arguments {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    serde_json::from_value(arguments).map_err(|e| DispatchError::InvalidArguments(e.to_string()))
}

/// Execute a tool by name
pub async fn execute_tool(ctx: &ToolContext, name: &str, arguments: Value) -> ToolsCallResult {
    let outcome = match find_tool(name) {
        Some(entry) => {
            debug!("Executing tool {}", name);
            (entry.handler)(ctx, arguments).await
        }
        None => Err(DispatchError::UnknownTool(name.to_string())),
    };

    match outcome {
        Ok(payload) => ToolsCallResult::success(payload),
        Err(e) => {
            warn!("Tool {} failed: {}", name, e);
            ToolsCallResult::error(json!({
                "error": e.to_string(),
                "tool": name,
            }))
        }
    }
}
