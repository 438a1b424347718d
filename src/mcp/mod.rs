//! MCP (Model Context Protocol) server implementation
//!
//! Exposes indexing control and search over stdio.

mod server;
mod tools;
mod types;

pub use server::McpServer;
pub use types::{McpError, McpRequest, McpResponse, ToolResult};
