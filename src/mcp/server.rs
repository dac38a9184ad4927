use super::protocol::{Incoming, Protocol};
use super::types::*;
use crate::config::Settings;
use crate::handlers::tool_handlers::ToolHandlers;
use anyhow::Result;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::mpsc;

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = env!("CARGO_PKG_NAME");
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Main MCP Server
pub struct McpServer {
    tool_handlers: Arc<ToolHandlers>,
}

/// What to do with one incoming message
enum Dispatch {
    Reply(JsonRpcResponse),
    CallTool { id: Value, request: CallToolRequest },
    Ignore,
}

impl McpServer {
    pub fn new(settings: Settings) -> Self {
        tracing::debug!("Server settings: {:?}", settings);
        Self {
            tool_handlers: Arc::new(ToolHandlers::new(settings)),
        }
    }

    pub async fn start(self) -> Result<()> {
        self.serve(Protocol::stdio()).await
    }

    /// Request loop; returns when the client closes the input stream and
    /// every tool call still running has answered.
    ///
    /// Tool calls run on their own tasks so a long rebuild never holds up
    /// lookups. All responses go through a single writer.
    pub async fn serve<R, W>(&self, protocol: Protocol<R, W>) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!("MCP server started, waiting for requests...");

        let (mut reader, mut writer) = protocol.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();

        let read_loop = async move {
            loop {
                let message = match reader.read_message().await {
                    Ok(Some(message)) => message,
                    Ok(None) => {
                        tracing::info!("Client disconnected");
                        break;
                    }
                    Err(e) => {
                        tracing::error!("Failed to read request: {}", e);
                        break;
                    }
                };

                match self.dispatch(message) {
                    Dispatch::Reply(response) => {
                        let _ = tx.send(response);
                    }
                    Dispatch::CallTool { id, request } => {
                        let handlers = Arc::clone(&self.tool_handlers);
                        let tx = tx.clone();
                        tokio::spawn(async move {
                            let _ = tx.send(call_tool(&handlers, id, request).await);
                        });
                    }
                    Dispatch::Ignore => {}
                }
            }
        };

        // Ends once the read loop and every spawned call have dropped their senders
        let write_loop = async move {
            while let Some(response) = rx.recv().await {
                if let Err(e) = writer.send_response(&response).await {
                    tracing::error!("Failed to send response: {}", e);
                }
            }
        };

        tokio::join!(read_loop, write_loop);
        Ok(())
    }

    fn dispatch(&self, message: Incoming) -> Dispatch {
        let value = match message {
            Incoming::Message(value) => value,
            Incoming::Invalid(e) => {
                tracing::warn!("Failed to parse request: {}", e);
                return Dispatch::Reply(JsonRpcResponse::failure(
                    Value::Null,
                    JsonRpcError::parse_error(),
                ));
            }
        };

        let id = value.get("id").cloned().unwrap_or(Value::Null);
        let request: JsonRpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                return Dispatch::Reply(JsonRpcResponse::failure(
                    id,
                    JsonRpcError::invalid_params(format!("Invalid request: {}", e)),
                ));
            }
        };

        tracing::debug!("Received request: method={}, id={:?}", request.method, request.id);

        if request.is_notification() {
            // Notifications never get a response
            tracing::debug!("Notification: {}", request.method);
            return Dispatch::Ignore;
        }

        let id = request.id.unwrap_or(Value::Null);
        match request.method.as_str() {
            "initialize" => Dispatch::Reply(self.handle_initialize(id, request.params)),
            "ping" => Dispatch::Reply(JsonRpcResponse::success(id, json!({}))),
            "tools/list" => Dispatch::Reply(self.handle_tools_list(id)),
            "tools/call" => match serde_json::from_value::<CallToolRequest>(request.params) {
                Ok(request) => Dispatch::CallTool { id, request },
                Err(e) => Dispatch::Reply(JsonRpcResponse::failure(
                    id,
                    JsonRpcError::invalid_params(format!("Invalid params: {}", e)),
                )),
            },
            _ => Dispatch::Reply(JsonRpcResponse::failure(id, JsonRpcError::method_not_found())),
        }
    }

    fn handle_initialize(&self, id: Value, params: Value) -> JsonRpcResponse {
        match serde_json::from_value::<InitializeRequest>(params) {
            Ok(req) => {
                tracing::info!(
                    "Client connected: {} v{} (protocol {})",
                    req.client_info.name,
                    req.client_info.version,
                    req.protocol_version
                );
            }
            Err(e) => {
                return JsonRpcResponse::failure(
                    id,
                    JsonRpcError::invalid_params(format!("Invalid initialize params: {}", e)),
                );
            }
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
        };

        JsonRpcResponse::success(id, json!(response))
    }

    fn handle_tools_list(&self, id: Value) -> JsonRpcResponse {
        let path_property = |description: &str| {
            json!({
                "type": "string",
                "description": description,
            })
        };

        let tools = vec![
            Tool {
                name: "setup_project".to_string(),
                description: r#"Create the project config file in a directory so its files can be indexed.

Does nothing if a config already governs the directory. The config names the tags file, extra include directories and the file patterns handed to ctags."#.to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "path": path_property("ABSOLUTE path to the project directory (a file path selects its directory).")
                    },
                    "required": ["path"]
                }),
            },
            Tool {
                name: "rebuild_tags".to_string(),
                description: r#"Run ctags over the project and replace its tags file.

⚠️ Only one rebuild runs at a time; a second request while one is running fails."#.to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "path": path_property("ABSOLUTE path inside the project.")
                    },
                    "required": ["path"]
                }),
            },
            Tool {
                name: "jump_to_definition".to_string(),
                description: r#"Resolve the symbol under the cursor and return its definition as `file:line:column`.

Definitions in the current file win, then definitions whose class/function scope encloses the cursor, then the first one in the tags file. The cursor position is saved so `jump_back` can return to it."#.to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "file": path_property("ABSOLUTE path of the file the cursor is in."),
                        "symbol": {
                            "type": "string",
                            "description": "Symbol name under the cursor"
                        },
                        "line": {
                            "type": "number",
                            "description": "1-based cursor line",
                            "default": 1
                        },
                        "column": {
                            "type": "number",
                            "description": "1-based cursor column",
                            "default": 1
                        },
                        "scope": {
                            "type": "string",
                            "description": "Dotted lexical scope at the cursor (e.g. 'Config.load'). Derived from indentation when omitted."
                        }
                    },
                    "required": ["file", "symbol"]
                }),
            },
            Tool {
                name: "jump_back".to_string(),
                description: "Return to the position saved by the last jump_to_definition in this project.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "path": path_property("ABSOLUTE path inside the project.")
                    },
                    "required": ["path"]
                }),
            },
            Tool {
                name: "search_definitions".to_string(),
                description: "List the definitions in the project's tags file, optionally only those of one symbol.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "path": path_property("ABSOLUTE path inside the project."),
                        "symbol": {
                            "type": "string",
                            "description": "Exact symbol name to list"
                        },
                        "limit": {
                            "type": "number",
                            "description": "Maximum number of definitions to return",
                            "default": 100
                        }
                    },
                    "required": ["path"]
                }),
            },
            Tool {
                name: "complete_symbol".to_string(),
                description: "Complete a symbol prefix from the names in the tags file.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "path": path_property("ABSOLUTE path inside the project."),
                        "prefix": {
                            "type": "string",
                            "description": "Prefix typed so far"
                        },
                        "limit": {
                            "type": "number",
                            "description": "Maximum number of completions",
                            "default": 100
                        }
                    },
                    "required": ["path", "prefix"]
                }),
            },
            Tool {
                name: "parent_scopes".to_string(),
                description: "Show the chain of indented blocks (classes, functions, loops...) enclosing a line.".to_string(),
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "file": path_property("ABSOLUTE path of the source file."),
                        "line": {
                            "type": "number",
                            "description": "1-based line number"
                        }
                    },
                    "required": ["file", "line"]
                }),
            },
        ];

        let response = ListToolsResponse { tools };
        JsonRpcResponse::success(id, json!(response))
    }
}

async fn call_tool(
    handlers: &ToolHandlers,
    id: Value,
    call_request: CallToolRequest,
) -> JsonRpcResponse {
    let args = &call_request.arguments;
    let result = match call_request.name.as_str() {
        "setup_project" => handlers.handle_setup_project(args).await,
        "rebuild_tags" => handlers.handle_rebuild_tags(args).await,
        "jump_to_definition" => handlers.handle_jump_to_definition(args).await,
        "jump_back" => handlers.handle_jump_back(args).await,
        "search_definitions" => handlers.handle_search_definitions(args).await,
        "complete_symbol" => handlers.handle_complete_symbol(args).await,
        "parent_scopes" => handlers.handle_parent_scopes(args).await,
        _ => {
            return JsonRpcResponse::failure(
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
            tracing::warn!("Tool {} failed: {:#}", call_request.name, e);
            CallToolResponse {
                content: vec![Content::Text {
                    text: format!("Error: {}", e),
                }],
                is_error: Some(true),
            }
        }
    };
    JsonRpcResponse::success(id, json!(response))
}
