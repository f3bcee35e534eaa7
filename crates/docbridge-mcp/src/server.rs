//! MCP server implementation
//!
//! Tool registry plus JSON-RPC method dispatch. Transport lives in
//! [`crate::transport`]; this module only maps requests to responses.

use crate::types::*;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// MCP server error types.
#[derive(Debug, Error)]
pub enum McpServerError {
    /// Tool not found
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool execution failed
    #[error("Tool execution failed: {0}")]
    ExecutionError(String),

    /// Invalid parameters
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for MCP server operations.
pub type McpServerResult<T> = Result<T, McpServerError>;

/// Trait for tool implementations.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool definition.
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with given arguments.
    ///
    /// Failures of the remote platform are reported as an error
    /// [`ToolResult`]; `Err` is reserved for malformed arguments and bugs.
    async fn execute(&self, args: Value, context: &ToolContext) -> McpServerResult<ToolResult>;
}

/// Context for tool execution.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Request correlation ID
    pub correlation_id: Option<String>,
}

impl ToolContext {
    /// Create an empty context.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Context tagged with a fresh time-ordered correlation ID.
    pub fn correlated() -> Self {
        Self {
            correlation_id: Some(uuid::Uuid::now_v7().to_string()),
        }
    }
}

/// MCP server exposing the registered tools.
pub struct McpServer {
    /// Server info
    info: ServerInfo,

    /// Server capabilities
    capabilities: ServerCapabilities,

    /// Registered tools, ordered by name so `tools/list` is stable
    tools: Arc<RwLock<BTreeMap<String, Arc<dyn Tool>>>>,

    /// Tool categories in registration order
    categories: Arc<RwLock<Vec<String>>>,
}

impl std::fmt::Debug for McpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpServer")
            .field("info", &self.info)
            .finish()
    }
}

impl McpServer {
    /// Create a new MCP server.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            info: ServerInfo {
                name: name.into(),
                version: version.into(),
            },
            capabilities: ServerCapabilities {
                tools: Some(ToolCapabilities {
                    list_changed: false,
                }),
            },
            tools: Arc::new(RwLock::new(BTreeMap::new())),
            categories: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Server named after this crate.
    pub fn docbridge() -> Self {
        Self::new("docbridge", env!("CARGO_PKG_VERSION"))
    }

    /// Register a tool. A tool with the same name is replaced.
    pub async fn register_tool(&self, tool: Arc<dyn Tool>) {
        let definition = tool.definition();
        let name = definition.name.clone();

        if let Some(ref category) = definition.category {
            let mut categories = self.categories.write().await;
            if !categories.contains(category) {
                categories.push(category.clone());
            }
        }

        let mut tools = self.tools.write().await;
        if tools.insert(name.clone(), tool).is_some() {
            warn!(tool = %name, "Replaced previously registered tool");
        }
    }

    /// Register multiple tools.
    pub async fn register_tools(&self, tools: Vec<Arc<dyn Tool>>) {
        for tool in tools {
            self.register_tool(tool).await;
        }
    }

    /// Get all tool definitions.
    pub async fn list_tools(&self) -> Vec<ToolDefinition> {
        let tools = self.tools.read().await;
        tools.values().map(|t| t.definition()).collect()
    }

    /// Get tools by category.
    pub async fn list_tools_by_category(&self, category: &str) -> Vec<ToolDefinition> {
        let tools = self.tools.read().await;
        tools
            .values()
            .map(|t| t.definition())
            .filter(|d| d.category.as_deref() == Some(category))
            .collect()
    }

    /// Get all categories.
    pub async fn list_categories(&self) -> Vec<String> {
        self.categories.read().await.clone()
    }

    /// Execute a tool.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        context: &ToolContext,
    ) -> McpServerResult<ToolResult> {
        let tool = {
            let tools = self.tools.read().await;
            tools
                .get(name)
                .cloned()
                .ok_or_else(|| McpServerError::ToolNotFound(name.to_string()))?
        };

        tool.execute(arguments, context).await
    }

    /// Handle an MCP request. Returns `None` for notifications.
    #[instrument(skip(self, request), fields(method = %request.method))]
    pub async fn handle_request(&self, request: McpRequest) -> Option<McpResponse> {
        if request.is_notification() {
            debug!("Notification received");
            return None;
        }
        let id = request.id.unwrap_or_default();

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(id),
            "ping" => McpResponse::success(id, serde_json::json!({})),
            "tools/list" => self.handle_tools_list(id).await,
            "tools/call" => self.handle_tools_call(id, request.params).await,
            other => McpResponse::error(id, McpError::method_not_found(other)),
        };
        Some(response)
    }

    fn handle_initialize(&self, id: RequestId) -> McpResponse {
        info!("Client initialized session");
        McpResponse::success(
            id,
            serde_json::json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": self.capabilities,
                "serverInfo": self.info
            }),
        )
    }

    async fn handle_tools_list(&self, id: RequestId) -> McpResponse {
        let tools = self.list_tools().await;
        McpResponse::success(id, serde_json::json!({ "tools": tools }))
    }

    async fn handle_tools_call(&self, id: RequestId, params: Option<Value>) -> McpResponse {
        let params = match params {
            Some(p) => p,
            None => return McpResponse::error(id, McpError::invalid_params("Missing params")),
        };

        let call: ToolCall = match serde_json::from_value(params) {
            Ok(c) => c,
            Err(e) => return McpResponse::error(id, McpError::invalid_params(e.to_string())),
        };

        let context = ToolContext::correlated();
        debug!(
            tool = %call.name,
            correlation_id = context.correlation_id.as_deref().unwrap_or_default(),
            "Calling tool"
        );

        match self.call_tool(&call.name, call.arguments, &context).await {
            Ok(result) => match serde_json::to_value(result) {
                Ok(value) => McpResponse::success(id, value),
                Err(e) => McpResponse::error(id, McpError::internal_error(e.to_string())),
            },
            Err(e @ McpServerError::ToolNotFound(_)) | Err(e @ McpServerError::InvalidParams(_)) => {
                McpResponse::error(id, McpError::invalid_params(e.to_string()))
            }
            Err(e) => McpResponse::error(id, McpError::internal_error(e.to_string())),
        }
    }

    /// Get server info.
    pub fn info(&self) -> &ServerInfo {
        &self.info
    }

    /// Get server capabilities.
    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }
}

/// Deserialize tool arguments, mapping failures to `InvalidParams`.
pub fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> McpServerResult<T> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| McpServerError::InvalidParams(e.to_string()))
}
