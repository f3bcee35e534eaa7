//! # Docbridge MCP
//!
//! MCP server for a Notion workspace with a Slack side channel.
//!
//! ## Overview
//!
//! - **Tools**: Notion pass-through tools, Slack context tools, a health probe
//! - **JSON-RPC**: MCP over newline-delimited stdio
//! - **Health**: startup probes of both platforms
//!
//! The `docbridge` binary also runs the change poller from `docbridge-watch`,
//! so edits in the watched database are announced in Slack while the server
//! is up.
//!
//! Supported methods:
//! - `initialize`
//! - `ping`
//! - `tools/list`
//! - `tools/call`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use docbridge_mcp::{McpServer, McpRequest};
//!
//! async fn handle(server: &McpServer, json: &str) -> Result<(), serde_json::Error> {
//!     let request: McpRequest = serde_json::from_str(json)?;
//!     if let Some(response) = server.handle_request(request).await {
//!         println!("{}", serde_json::to_string(&response)?);
//!     }
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod health;
pub mod server;
pub mod tools;
pub mod transport;
pub mod types;

pub use context::{ContextRequest, SlackContextProvider};
pub use health::{HealthChecker, HealthReport, HealthStatus, HealthTool, ServiceHealth};
pub use server::{McpServer, McpServerError, McpServerResult, Tool, ToolContext};
pub use tools::{all_tools, notion_tools, slack_tools};
pub use transport::{serve, serve_stdio, TransportError};
pub use types::{
    ContentBlock, McpError, McpRequest, McpResponse, RequestId, ServerCapabilities, ServerInfo,
    ToolCall, ToolDefinition, ToolResult,
};
