//! Slack MCP tools
//!
//! Channel context for assistants plus a history search used to check
//! that notifications arrived.

use crate::context::{ContextRequest, SlackContextProvider};
use crate::server::{parse_args, McpServerResult, Tool, ToolContext};
use crate::types::{ToolDefinition, ToolResult};
use async_trait::async_trait;
use docbridge_watch::{SlackNotifier, SEARCH_WINDOW};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, instrument};

const CATEGORY: &str = "slack";

/// Slack tools sharing one notifier.
pub fn slack_tools(notifier: Arc<SlackNotifier>) -> Vec<Arc<dyn Tool>> {
    let provider = SlackContextProvider::new(notifier.clone());
    vec![
        Arc::new(GetContextTool {
            provider: provider.clone(),
        }),
        Arc::new(UpdateContextTool { provider }),
        Arc::new(FindMessageTool { notifier }),
    ]
}

/// A context payload carrying `error` is reported as a failed call.
fn context_result(payload: Value) -> ToolResult {
    if payload.get("error").is_some() {
        let mut result = ToolResult::json(&payload);
        result.is_error = true;
        result
    } else {
        ToolResult::json(&payload)
    }
}

/// Recent messages of a channel.
pub struct GetContextTool {
    provider: SlackContextProvider,
}

#[async_trait]
impl Tool for GetContextTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "slack-get-context",
            "Get the most recent messages of a Slack channel",
        )
        .with_category(CATEGORY)
        .with_schema(json!({
            "type": "object",
            "properties": {
                "channel": { "type": "string", "description": "Channel name or ID" }
            },
            "required": ["channel"]
        }))
    }

    #[instrument(skip_all, fields(tool = "slack-get-context"))]
    async fn execute(&self, args: Value, _context: &ToolContext) -> McpServerResult<ToolResult> {
        let request: ContextRequest = parse_args(args)?;
        Ok(context_result(self.provider.get_context(request).await))
    }
}

/// Posts a message to a channel.
pub struct UpdateContextTool {
    provider: SlackContextProvider,
}

#[async_trait]
impl Tool for UpdateContextTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("slack-update-context", "Post a message to a Slack channel")
            .with_category(CATEGORY)
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "channel": { "type": "string", "description": "Channel name or ID" },
                    "message": { "type": "string", "description": "Message text" }
                },
                "required": ["channel", "message"]
            }))
    }

    #[instrument(skip_all, fields(tool = "slack-update-context"))]
    async fn execute(&self, args: Value, _context: &ToolContext) -> McpServerResult<ToolResult> {
        let request: ContextRequest = parse_args(args)?;
        Ok(context_result(self.provider.update_context(request).await))
    }
}

/// Finds a recent message by substring.
pub struct FindMessageTool {
    notifier: Arc<SlackNotifier>,
}

#[derive(Debug, Deserialize)]
struct FindMessageArgs {
    channel: String,
    text: String,
}

#[async_trait]
impl Tool for FindMessageTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "slack-find-message",
            format!(
                "Find the newest of the last {} messages in a channel containing some text (case-insensitive)",
                SEARCH_WINDOW
            ),
        )
        .with_category(CATEGORY)
        .with_schema(json!({
            "type": "object",
            "properties": {
                "channel": { "type": "string", "description": "Channel name or ID" },
                "text": { "type": "string", "description": "Text to look for" }
            },
            "required": ["channel", "text"]
        }))
    }

    #[instrument(skip_all, fields(tool = "slack-find-message"))]
    async fn execute(&self, args: Value, _context: &ToolContext) -> McpServerResult<ToolResult> {
        let args: FindMessageArgs = parse_args(args)?;
        debug!(channel = %args.channel, "Searching channel history");

        match self.notifier.search(&args.channel, &args.text).await {
            Ok(Some(message)) => Ok(ToolResult::json(&json!({
                "found": true,
                "text": message.text,
                "user": message.user,
                "timestamp": message.ts,
                "threadTs": message.thread_ts,
            }))),
            Ok(None) => Ok(ToolResult::json(&json!({ "found": false }))),
            Err(e) => Ok(ToolResult::error(format!("Error finding message: {}", e))),
        }
    }
}
