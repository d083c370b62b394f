use super::protocol::{error_response, success_response, Incoming, Protocol};
use super::types::*;
use crate::config::Config;
use crate::handlers::tool_handlers::ToolHandlers;
use anyhow::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite};

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "code-capture-mcp";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

const INSTRUCTIONS: &str = "Capture exact code blocks from files by line range or by Python \
symbol name, summarize Python modules, diff two texts, and search folders. Relative paths \
resolve against the server's root directory.";

/// Main MCP Server
pub struct McpServer {
    tool_handlers: Arc<ToolHandlers>,
}

impl McpServer {
    pub fn new(config: Config) -> Self {
        tracing::debug!("Resolving relative paths against {}", config.root.display());
        Self {
            tool_handlers: Arc::new(ToolHandlers::new(config)),
        }
    }

    /// Serve requests until the input stream closes.
    pub async fn start<R, W>(self, mut protocol: Protocol<R, W>) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!("MCP server started, waiting for requests...");

        loop {
            let response = match protocol.read_message().await {
                Ok(Some(Incoming::Request(request))) => self.handle_request(request).await,
                Ok(Some(Incoming::Malformed(e))) => {
                    tracing::warn!("Failed to decode request: {}", e);
                    Some(error_response(Value::Null, JsonRpcError::parse_error()))
                }
                Ok(None) => {
                    tracing::info!("Client disconnected");
                    break;
                }
                Err(e) => {
                    tracing::error!("Failed to read request: {}", e);
                    break;
                }
            };

            if let Some(response) = response {
                if let Err(e) = protocol.send_response(&response).await {
                    tracing::error!("Failed to send response: {}", e);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Dispatch one request. Notifications never produce a response.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        tracing::debug!("Received request: method={}, id={:?}", request.method, request.id);

        if request.is_notification() {
            tracing::debug!("Notification: {}", request.method);
            return None;
        }
        let id = request.id.unwrap_or(Value::Null);

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(id, request.params),
            "ping" => success_response(id, json!({})),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, request.params).await,
            method => error_response(id, JsonRpcError::method_not_found(method)),
        };
        Some(response)
    }

    fn handle_initialize(&self, id: Value, params: Value) -> JsonRpcResponse {
        // Minimal or odd initialize params are tolerated.
        let request: InitializeRequest = serde_json::from_value(params).unwrap_or_default();
        if let Some(client) = &request.client_info {
            tracing::info!("Client connected: {} v{}", client.name, client.version);
        }

        let response = InitializeResponse {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability {
                    list_changed: Some(false),
                },
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
            instructions: Some(INSTRUCTIONS.to_string()),
        };

        success_response(id, json!(response))
    }

    fn handle_tools_list(&self, id: Value) -> JsonRpcResponse {
        let response = ListToolsResponse {
            tools: tool_definitions(),
        };
        success_response(id, json!(response))
    }

    async fn handle_tools_call(&self, id: Value, params: Value) -> JsonRpcResponse {
        let call_request: CallToolRequest = match serde_json::from_value(params) {
            Ok(req) => req,
            Err(e) => {
                return error_response(id, JsonRpcError::invalid_params(format!("Invalid params: {}", e)));
            }
        };

        let handlers = &self.tool_handlers;
        let args = &call_request.arguments;
        let result = match call_request.name.as_str() {
            "capture_code" => handlers.handle_capture_code(args).await,
            "capture_blocks" => handlers.handle_capture_blocks(args).await,
            "capture_symbol" => handlers.handle_capture_symbol(args).await,
            "capture_all" => handlers.handle_capture_all(args).await,
            "summarize_file" => handlers.handle_summarize_file(args).await,
            "compute_diff" => handlers.handle_compute_diff(args).await,
            "search_folder" => handlers.handle_search_folder(args).await,
            _ => {
                return error_response(
                    id,
                    JsonRpcError::invalid_params(format!("Unknown tool: {}", call_request.name)),
                );
            }
        };

        let response = match result {
            Ok(content) => CallToolResponse {
                content,
                is_error: None,
            },
            Err(e) => {
                tracing::debug!("Tool {} failed: {:#}", call_request.name, e);
                CallToolResponse {
                    content: vec![Content::text(format!("Error: {:#}", e))],
                    is_error: Some(true),
                }
            }
        };
        success_response(id, json!(response))
    }
}

fn tool(name: &str, description: &str, input_schema: Value) -> Tool {
    Tool {
        name: name.to_string(),
        description: description.to_string(),
        input_schema,
    }
}

fn tool_definitions() -> Vec<Tool> {
    vec![
        tool(
            "capture_code",
            "Capture an exact, inclusive line range from a file as a fenced code block.",
            json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string", "description": "Path to the file"},
                    "start_line": {"type": "integer", "minimum": 1, "description": "First line (1-indexed)"},
                    "end_line": {"type": "integer", "minimum": 1, "description": "Last line, inclusive. Defaults to start_line"},
                    "line_numbers": {"type": "boolean", "default": true}
                },
                "required": ["file_path", "start_line"]
            }),
        ),
        tool(
            "capture_blocks",
            "Capture several line ranges from one file into a single markdown document.",
            json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string"},
                    "ranges": {
                        "type": "array",
                        "description": "Ranges as [start, end] or [start]",
                        "items": {"type": "array", "items": {"type": "integer"}, "minItems": 1, "maxItems": 2}
                    },
                    "title": {"type": "string", "default": "Code Documentation"}
                },
                "required": ["file_path", "ranges"]
            }),
        ),
        tool(
            "capture_symbol",
            r#"Capture a Python function, class or method by name.

Use `name` for a top-level function, `class_name` for a class, `class_name` with `method_name` for a method, or `names` for several functions, classes or methods at once."#,
            json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string"},
                    "name": {"type": "string"},
                    "names": {"type": "array", "items": {"type": "string"}},
                    "class_name": {"type": "string"},
                    "method_name": {"type": "string"},
                    "line_numbers": {"type": "boolean", "default": true}
                },
                "required": ["file_path"]
            }),
        ),
        tool(
            "capture_all",
            "Capture every function or every class in a Python file.",
            json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string"},
                    "target": {"type": "string", "enum": ["functions", "classes"], "default": "functions"},
                    "include_methods": {"type": "boolean", "default": false}
                },
                "required": ["file_path"]
            }),
        ),
        tool(
            "summarize_file",
            "List the classes, methods and functions of a Python file with their line spans and docstrings.",
            json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string"},
                    "format": {"type": "string", "enum": ["text", "json"], "default": "text"}
                },
                "required": ["file_path"]
            }),
        ),
        tool(
            "compute_diff",
            "Line-level diff between two texts or files.",
            json!({
                "type": "object",
                "properties": {
                    "old_code": {"type": "string"},
                    "old_path": {"type": "string"},
                    "new_code": {"type": "string"},
                    "new_path": {"type": "string"},
                    "view": {"type": "string", "enum": ["inline", "side_by_side", "unified"], "default": "inline"},
                    "algorithm": {"type": "string", "enum": ["myers", "patience", "lcs"], "default": "myers"}
                }
            }),
        ),
        tool(
            "search_folder",
            "Search text files under a folder for a literal string or regular expression.",
            json!({
                "type": "object",
                "properties": {
                    "folder_path": {"type": "string"},
                    "query": {"type": "string"},
                    "is_regex": {"type": "boolean", "default": false},
                    "case_sensitive": {"type": "boolean", "default": false},
                    "context_lines": {"type": "integer", "minimum": 0},
                    "max_results": {"type": "integer", "minimum": 1},
                    "extensions": {"type": "array", "items": {"type": "string"}},
                    "show_context": {"type": "boolean", "default": true}
                },
                "required": ["folder_path", "query"]
            }),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn server(root: &std::path::Path) -> McpServer {
        McpServer::new(Config {
            root: root.to_path_buf(),
            ..Config::default()
        })
    }

    fn request(id: Option<Value>, method: &str, params: Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.to_string(),
            params,
        }
    }

    #[tokio::test]
    async fn test_initialize_and_notifications() {
        let dir = TempDir::new().unwrap();
        let server = server(dir.path());

        let response = server
            .handle_request(request(Some(json!(1)), "initialize", json!({"protocolVersion": "2024-11-05"})))
            .await
            .unwrap();
        let result = response.result.unwrap();
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);

        let none = server
            .handle_request(request(None, "notifications/initialized", Value::Null))
            .await;
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_tools_list_names() {
        let dir = TempDir::new().unwrap();
        let response = server(dir.path())
            .handle_request(request(Some(json!("a")), "tools/list", Value::Null))
            .await
            .unwrap();
        let tools = response.result.unwrap()["tools"].clone();
        let names: Vec<&str> = tools
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap())
            .collect();
        assert_eq!(
            names,
            [
                "capture_code",
                "capture_blocks",
                "capture_symbol",
                "capture_all",
                "summarize_file",
                "compute_diff",
                "search_folder"
            ]
        );
        assert!(tools[0]["inputSchema"]["required"].is_array());
    }

    #[tokio::test]
    async fn test_tool_errors_are_results() {
        let dir = TempDir::new().unwrap();
        let response = server(dir.path())
            .handle_request(request(
                Some(json!(3)),
                "tools/call",
                json!({"name": "capture_code", "arguments": {"file_path": "missing.py", "start_line": 1}}),
            ))
            .await
            .unwrap();
        assert!(response.error.is_none());
        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"].as_str().unwrap().starts_with("Error: Not found"));
    }

    #[tokio::test]
    async fn test_protocol_errors() {
        let dir = TempDir::new().unwrap();
        let server = server(dir.path());

        let unknown_method = server
            .handle_request(request(Some(json!(4)), "resources/list", Value::Null))
            .await
            .unwrap();
        assert_eq!(unknown_method.error.unwrap().code, -32601);

        let unknown_tool = server
            .handle_request(request(Some(json!(5)), "tools/call", json!({"name": "index_codebase"})))
            .await
            .unwrap();
        assert_eq!(unknown_tool.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn test_start_answers_each_line() {
        let dir = TempDir::new().unwrap();
        let input = concat!(
            "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n",
            "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n",
            "{broken\n",
        );
        let mut output = Vec::new();
        server(dir.path())
            .start(Protocol::new(input.as_bytes(), &mut output))
            .await
            .unwrap();

        let written = String::from_utf8(output).unwrap();
        let lines: Vec<Value> = written.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], 1);
        assert_eq!(lines[1]["id"], Value::Null);
        assert_eq!(lines[1]["error"]["code"], -32700);
    }
}
