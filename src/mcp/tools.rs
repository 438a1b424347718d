//! MCP tool definitions and handlers

use super::types::{ToolDefinition, ToolResult};
use crate::commands::{
    cmd_index_page, cmd_search, cmd_start_indexing, cmd_statistics, cmd_stop_indexing,
    SearchOptions, Services,
};
use crate::error::Result;
use crate::indexing::IndexingResponse;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::error;

/// Get all available tool definitions
pub fn get_tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "start_indexing".to_string(),
            description: "Re-crawl and re-index every configured site from scratch. Runs in the background; use statistics to follow progress.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
        ToolDefinition {
            name: "stop_indexing".to_string(),
            description: "Stop the running indexing. Sites that did not finish are marked as failed.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
        ToolDefinition {
            name: "index_page".to_string(),
            description: "Re-index a single page of one of the configured sites.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "Absolute URL of the page"
                    }
                },
                "required": ["url"]
            }),
        },
        ToolDefinition {
            name: "search".to_string(),
            description: "Full-text search over the indexed sites. Every word of the query must occur on a page. Returns ranked pages with highlighted snippets.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Words to search for"
                    },
                    "site": {
                        "type": "string",
                        "description": "Optional: root URL of a configured site to search in"
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of results to return",
                        "minimum": 1
                    },
                    "offset": {
                        "type": "integer",
                        "description": "Number of results to skip",
                        "default": 0,
                        "minimum": 0
                    }
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: "statistics".to_string(),
            description: "Pages and lemmas indexed per configured site, with indexing status.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {}
            }),
        },
    ]
}

/// Handle a tool call
pub async fn handle_tool_call(
    name: &str,
    arguments: &HashMap<String, Value>,
    services: &Services,
) -> ToolResult {
    match name {
        "start_indexing" => indexing_result(cmd_start_indexing(services).await),
        "stop_indexing" => indexing_result(cmd_stop_indexing(services).await),
        "index_page" => handle_index_page(arguments, services).await,
        "search" => handle_search(arguments, services).await,
        "statistics" => handle_statistics(services).await,
        _ => ToolResult::error(format!("Unknown tool: {}", name)),
    }
}

fn indexing_result(response: Result<IndexingResponse>) -> ToolResult {
    match response {
        Ok(response) => ToolResult::envelope(&response, response.result),
        Err(e) => {
            error!("Indexing request failed: {}", e);
            ToolResult::error(format!("Indexing request failed: {}", e))
        }
    }
}

async fn handle_index_page(arguments: &HashMap<String, Value>, services: &Services) -> ToolResult {
    // A missing url goes through the same validation as a blank one
    let url = arguments
        .get("url")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    indexing_result(cmd_index_page(services, url, false).await)
}

async fn handle_search(arguments: &HashMap<String, Value>, services: &Services) -> ToolResult {
    let query = match arguments.get("query") {
        Some(Value::String(q)) => q.clone(),
        _ => return ToolResult::error("Missing required parameter: query"),
    };

    let options = SearchOptions {
        site: arguments
            .get("site")
            .and_then(|v| v.as_str())
            .map(ToString::to_string),
        limit: arguments.get("limit").and_then(|v| v.as_i64()),
        offset: arguments
            .get("offset")
            .and_then(|v| v.as_i64())
            .unwrap_or(0),
    };

    match cmd_search(services, &query, options).await {
        Ok(response) => ToolResult::envelope(&response, response.result),
        Err(e) => {
            error!("Search failed: {}", e);
            ToolResult::error(format!("Search failed: {}", e))
        }
    }
}

async fn handle_statistics(services: &Services) -> ToolResult {
    match cmd_statistics(services).await {
        Ok(statistics) => ToolResult::envelope(
            &json!({ "result": true, "statistics": statistics }),
            true,
        ),
        Err(e) => ToolResult::error(format!("Failed to get statistics: {}", e)),
    }
}
