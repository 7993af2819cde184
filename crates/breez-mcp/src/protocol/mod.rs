//! MCP protocol types
//!
//! JSON-RPC envelopes, lifecycle messages and tool messages used by the
//! wallet server.

pub mod capabilities;
pub mod jsonrpc;
pub mod lifecycle;
pub mod messages;

pub use capabilities::*;
pub use jsonrpc::*;
pub use lifecycle::*;
pub use messages::*;
