//! MCP transports

pub mod stdio;

pub use stdio::*;
