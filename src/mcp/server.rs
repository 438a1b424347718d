//! MCP stdio server implementation

use super::tools::{get_tool_definitions, handle_tool_call};
use super::types::{ErrorCode, McpError, McpMessage, McpNotification, McpRequest, McpResponse};
use crate::commands::Services;
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

/// MCP Server implementation
pub struct McpServer {
    services: Services,
}

impl McpServer {
    /// Create a new MCP server
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    /// Run the MCP server loop over stdio
    ///
    /// Stdin is read asynchronously so indexing started from a tool call
    /// keeps running between requests.
    pub async fn run(&self) -> Result<(), McpError> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdout = tokio::io::stdout();

        info!("MCP server starting on stdio");

        while let Some(line) = lines.next_line().await? {
            if let Some(reply) = self.handle_line(&line).await {
                debug!("Sending: {}", reply);
                stdout.write_all(reply.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }

        info!("MCP server shutting down");
        Ok(())
    }

    /// Handle one line of input, returning the reply to send, if any
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        debug!("Received: {}", line);

        let message: McpMessage = match serde_json::from_str(line) {
            Ok(m) => m,
            Err(e) => {
                error!("Failed to parse message: {}", e);
                let response =
                    McpResponse::error(None, ErrorCode::ParseError, format!("Parse error: {}", e));
                return serde_json::to_string(&response).ok();
            }
        };

        match message {
            McpMessage::Request(req) => {
                let response = self.handle_request(req).await;
                match serde_json::to_string(&response) {
                    Ok(reply) => Some(reply),
                    Err(e) => {
                        error!("Failed to serialize response: {}", e);
                        None
                    }
                }
            }
            McpMessage::Notification(notif) => {
                self.handle_notification(notif);
                None
            }
            McpMessage::Response(_) => {
                warn!("Unexpected response message received");
                None
            }
        }
    }

    /// Handle an MCP request
    async fn handle_request(&self, request: McpRequest) -> McpResponse {
        let id = request.id.clone();

        match request.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "ping" => McpResponse::success(id, json!({})),
            "tools/list" => McpResponse::success(id, json!({ "tools": get_tool_definitions() })),
            "tools/call" => self.handle_tools_call(id, request.params).await,
            "resources/list" => McpResponse::success(id, json!({ "resources": [] })),
            "prompts/list" => McpResponse::success(id, json!({ "prompts": [] })),
            _ => McpResponse::error(
                id,
                ErrorCode::MethodNotFound,
                format!("Method not found: {}", request.method),
            ),
        }
    }

    /// Handle notifications (fire-and-forget)
    fn handle_notification(&self, notification: McpNotification) {
        match notification.method.as_str() {
            "notifications/initialized" => info!("Client initialized"),
            "notifications/cancelled" => info!("Request cancelled"),
            _ => debug!("Unknown notification: {}", notification.method),
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> McpResponse {
        McpResponse::success(
            id,
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {
                    "tools": {
                        "listChanged": false
                    }
                },
                "serverInfo": {
                    "name": "sitesearch",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        )
    }

    async fn handle_tools_call(&self, id: Option<Value>, params: Option<Value>) -> McpResponse {
        let Some(params) = params else {
            return McpResponse::error(id, ErrorCode::InvalidParams, "Missing params");
        };

        let Some(name) = params.get("name").and_then(|v| v.as_str()) else {
            return McpResponse::error(id, ErrorCode::InvalidParams, "Missing tool name");
        };

        let arguments: HashMap<String, Value> = params
            .get("arguments")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        debug!("Calling tool: {} with args: {:?}", name, arguments);

        let result = handle_tool_call(name, &arguments, &self.services).await;
        match serde_json::to_value(&result) {
            Ok(value) => McpResponse::success(id, value),
            Err(e) => McpResponse::error(id, ErrorCode::InternalError, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, SiteConfig};
    use tempfile::TempDir;

    async fn server() -> (McpServer, TempDir) {
        let tmp = TempDir::new().unwrap();
        let mut config = Config {
            sites: vec![SiteConfig::new("https://example.com", "Example")],
            ..Config::default()
        };
        config.paths.db_file = tmp.path().join("test.db");
        let services = Services::open(config).await.unwrap();
        (McpServer::new(services), tmp)
    }

    async fn call(server: &McpServer, request: Value) -> Value {
        let reply = server.handle_line(&request.to_string()).await.unwrap();
        serde_json::from_str(&reply).unwrap()
    }

    fn tool_payload(response: &Value) -> Value {
        let text = response["result"]["content"][0]["text"].as_str().unwrap();
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn test_initialize_and_list_tools() {
        let (server, _tmp) = server().await;

        let init = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
        )
        .await;
        assert_eq!(init["result"]["serverInfo"]["name"], "sitesearch");

        let tools = call(&server, json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"})).await;
        let names: Vec<&str> = tools["result"]["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            vec!["start_indexing", "stop_indexing", "index_page", "search", "statistics"]
        );
    }

    #[tokio::test]
    async fn test_guard_failures_are_tool_errors() {
        let (server, _tmp) = server().await;

        let stop = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call",
                   "params": {"name": "stop_indexing", "arguments": {}}}),
        )
        .await;
        assert_eq!(stop["result"]["isError"], true);
        assert_eq!(
            tool_payload(&stop),
            json!({"result": false, "error": "Indexing is not running"})
        );

        let search = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call",
                   "params": {"name": "search", "arguments": {"query": "cats"}}}),
        )
        .await;
        assert_eq!(tool_payload(&search)["result"], false);

        let stats = call(
            &server,
            json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call",
                   "params": {"name": "statistics"}}),
        )
        .await;
        assert_eq!(stats["result"]["isError"], false);
        assert_eq!(tool_payload(&stats)["statistics"]["total"]["sites"], 1);
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let (server, _tmp) = server().await;

        let parse: Value =
            serde_json::from_str(&server.handle_line("{not json").await.unwrap()).unwrap();
        assert_eq!(parse["error"]["code"], -32700);

        let unknown = call(&server, json!({"jsonrpc": "2.0", "id": 6, "method": "nope"})).await;
        assert_eq!(unknown["error"]["code"], -32601);

        let notification = server
            .handle_line(r#"{"jsonrpc": "2.0", "method": "notifications/initialized"}"#)
            .await;
        assert!(notification.is_none());
    }
}
