//! MCP server core — handles JSON-RPC requests, routes `tools/call` to the
//! six tool handlers in [`crate::tools`].

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::protocol::messages::{
    CallToolRequest, CallToolResult, InitializeRequest, InitializeResult, ListToolsResult,
    ServerCapabilities, ServerInfo, ToolDescription, ToolResultContent,
};
use crate::protocol::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, MCP_VERSION};
use crate::state::AppState;
use crate::tools;

pub struct McpServer {
    state: AppState,
    initialized: bool,
}

impl McpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            initialized: false,
        }
    }

    pub async fn handle_request(&mut self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!("handling request: {}", request.method);

        if !self.initialized
            && request.method != "initialize"
            && request.method != "notifications/initialized"
        {
            warn!("rejecting '{}': server not initialized", request.method);
            return Some(JsonRpcResponse::error(
                request.id,
                JsonRpcError::server_not_initialized(),
            ));
        }

        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params),
            "notifications/initialized" => return None,
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(request.params).await,
            "ping" => Ok(serde_json::json!({})),
            method => {
                warn!("unknown method: {}", method);
                Err(JsonRpcError::method_not_found())
            }
        };

        Some(match result {
            Ok(result) => JsonRpcResponse::success(request.id, result),
            Err(error) => JsonRpcResponse::error(request.id, error),
        })
    }

    fn handle_initialize(
        &mut self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        let request: InitializeRequest = match params {
            Some(p) => {
                serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?
            }
            None => InitializeRequest::default(),
        };

        let negotiated_version = if request.protocol_version.as_str() < MCP_VERSION {
            request.protocol_version.clone()
        } else {
            MCP_VERSION.to_string()
        };

        self.initialized = true;

        let result = InitializeResult {
            protocol_version: negotiated_version,
            server_info: ServerInfo {
                name: "cortex".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            capabilities: ServerCapabilities {
                tools: Some({
                    let mut map = HashMap::new();
                    map.insert("listChanged".to_string(), serde_json::json!(false));
                    map
                }),
            },
            instructions: Some(
                "Cortex is a long-term memory service. Call 'recall' at the start of a turn to \
                 inject relevant context, 'remember' to save a durable fact, 'search' for a raw \
                 lookup, 'forget' to delete a memory outright, and 'list_relations' to inspect \
                 the extracted relation graph."
                    .to_string(),
            ),
        };

        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    fn handle_tools_list(&self) -> Result<serde_json::Value, JsonRpcError> {
        let result = ListToolsResult {
            tools: vec![
                ToolDescription {
                    name: "recall".to_string(),
                    description: Some(
                        "Recall relevant memories for a query, formatted for prompt injection."
                            .to_string(),
                    ),
                    input_schema: tools::recall::schema(),
                },
                ToolDescription {
                    name: "remember".to_string(),
                    description: Some(
                        "Save a durable fact directly, bypassing per-turn ingestion.".to_string(),
                    ),
                    input_schema: tools::remember::schema(),
                },
                ToolDescription {
                    name: "forget".to_string(),
                    description: Some("Delete a memory by id.".to_string()),
                    input_schema: tools::forget::schema(),
                },
                ToolDescription {
                    name: "search".to_string(),
                    description: Some(
                        "Raw hybrid search over memories, without prompt formatting."
                            .to_string(),
                    ),
                    input_schema: tools::search::schema(),
                },
                ToolDescription {
                    name: "stats".to_string(),
                    description: Some("Store-wide memory/relation/agent counts.".to_string()),
                    input_schema: tools::stats::schema(),
                },
                ToolDescription {
                    name: "list_relations".to_string(),
                    description: Some("List the relation graph for an agent.".to_string()),
                    input_schema: tools::list_relations::schema(),
                },
            ],
        };
        serde_json::to_value(result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }

    async fn handle_tools_call(
        &self,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, JsonRpcError> {
        let request: CallToolRequest = match params {
            Some(p) => {
                serde_json::from_value(p).map_err(|e| JsonRpcError::invalid_params(&e.to_string()))?
            }
            None => return Err(JsonRpcError::invalid_params("missing tool call parameters")),
        };

        let result = match request.name.as_str() {
            "recall" => tools::recall::execute(&self.state, request.arguments).await,
            "remember" => tools::remember::execute(&self.state, request.arguments).await,
            "forget" => tools::forget::execute(&self.state, request.arguments).await,
            "search" => tools::search::execute(&self.state, request.arguments).await,
            "stats" => tools::stats::execute(&self.state, request.arguments).await,
            "list_relations" => tools::list_relations::execute(&self.state, request.arguments).await,
            name => {
                return Err(JsonRpcError::method_not_found_with_message(&format!(
                    "unknown tool: {name}"
                )));
            }
        };

        let call_result = match result {
            Ok(content) => CallToolResult {
                content: vec![ToolResultContent {
                    content_type: "text".to_string(),
                    text: serde_json::to_string_pretty(&content)
                        .unwrap_or_else(|_| content.to_string()),
                }],
                is_error: Some(false),
            },
            Err(e) => CallToolResult {
                content: vec![ToolResultContent {
                    content_type: "text".to_string(),
                    text: serde_json::json!({ "error": e }).to_string(),
                }],
                is_error: Some(true),
            },
        };

        serde_json::to_value(call_result).map_err(|e| JsonRpcError::internal_error(&e.to_string()))
    }
}
