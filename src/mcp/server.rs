use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{
    facebook_tools::{FacebookCommentsTool, FacebookPostsTool},
    tools::ToolRegistry,
    types::*,
    MCP_PROTOCOL_VERSION,
};
use super::constants::{SERVER_NAME, SERVER_VERSION};
use crate::{apify::ActorRunner, config::Config};

pub struct McpServer {
    pub tools: ToolRegistry,
}

/// Macro to register multiple tools at once
macro_rules! register_tools {
    ($registry:expr, $($tool:expr),+ $(,)?) => {
        $(
            $registry.register($tool);
        )+
    };
}

impl McpServer {
    pub fn new(config: &Config, actor: Arc<dyn ActorRunner>) -> Self {
        let mut tools = ToolRegistry::new();

        register_tools!(
            tools,
            FacebookPostsTool::new(actor.clone(), config.result_mode),
            FacebookCommentsTool::new(actor, config.result_mode),
        );

        Self { tools }
    }

    /// Dispatch one JSON-RPC message. Returns `None` for notifications, which
    /// never get a response.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        debug!("Handling MCP request: {}", request.method);

        if request.is_notification() {
            info!("Received notification: {}", request.method);
            return None;
        }

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(request.params),
            "tools/list" => self.handle_list_tools(),
            "tools/call" => self.handle_call_tool(request.params).await,
            _ => {
                warn!("Unknown method: {}", request.method);
                Err(JsonRpcError::new(
                    METHOD_NOT_FOUND,
                    format!("Method not found: {}", request.method),
                ))
            }
        };

        Some(match response {
            Ok(result) => JsonRpcResponse::success(request.id, result),
            Err(error) => JsonRpcResponse::failure(request.id, error),
        })
    }

    fn handle_initialize(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        info!("Handling initialize request");

        let request: InitializeRequest = match params {
            Some(Value::Null) | None => InitializeRequest::default(),
            Some(params) => serde_json::from_value(params)
                .map_err(|e| JsonRpcError::internal(format!("Invalid initialize params: {}", e)))?,
        };

        if let Some(client_version) = &request.protocol_version {
            info!(
                "Protocol version negotiation - Client requested: {}, Server supports: {}",
                client_version, MCP_PROTOCOL_VERSION
            );
        }
        if let Some(client) = &request.client_info {
            info!("Client: {} {}", client.name, client.version);
        }

        let response = InitializeResponse {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: ToolsCapability::default(),
            },
            server_info: ServerInfo {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
        };

        serde_json::to_value(response)
            .map_err(|e| JsonRpcError::internal(format!("Failed to serialize response: {}", e)))
    }

    fn handle_list_tools(&self) -> Result<Value, JsonRpcError> {
        info!("Handling list_tools request");

        let response = ListToolsResponse {
            tools: self.tools.list_tools(),
        };

        serde_json::to_value(response)
            .map_err(|e| JsonRpcError::internal(format!("Failed to serialize tools: {}", e)))
    }

    async fn handle_call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let request: CallToolRequest = match params {
            Some(params) => serde_json::from_value(params)
                .map_err(|e| JsonRpcError::internal(format!("Invalid call_tool params: {}", e)))?,
            None => return Err(JsonRpcError::internal("Missing call_tool parameters")),
        };

        let arguments = match request.arguments {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(other) => {
                return Err(JsonRpcError::internal(format!(
                    "Tool arguments must be an object, got: {}",
                    other
                )))
            }
        };

        info!("Calling tool: {}", request.name);
        if !arguments.is_empty() {
            debug!(
                "Tool parameters: {}",
                serde_json::to_string(&arguments)
                    .unwrap_or_else(|_| "Failed to serialize parameters".to_string())
            );
        }

        let text = self
            .tools
            .call_tool(&request.name, arguments)
            .await
            .ok_or_else(|| {
                warn!("Unknown tool: {}", request.name);
                JsonRpcError::new(METHOD_NOT_FOUND, format!("Unknown tool: {}", request.name))
            })?;

        serde_json::to_value(CallToolResponse::text(text)).map_err(|e| {
            JsonRpcError::internal(format!("Failed to serialize tool response: {}", e))
        })
    }
}
