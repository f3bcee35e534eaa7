//! MCP tools
//!
//! Tools are grouped by platform. Each group is built from shared clients so
//! the whole server talks to Slack and Notion through one connection pool.

pub mod notion;
pub mod slack;

pub use notion::*;
pub use slack::*;

use crate::health::{HealthChecker, HealthTool};
use crate::server::Tool;
use docbridge_clients::NotionClient;
use docbridge_watch::SlackNotifier;
use std::sync::Arc;

/// Every tool the server exposes:
/// - Notion: the twelve database, page, block and search tools
/// - Slack: channel context and history search
/// - Bridge: `bridge-health`
pub fn all_tools(
    notion: Arc<NotionClient>,
    notifier: Arc<SlackNotifier>,
    health: Arc<HealthChecker>,
) -> Vec<Arc<dyn Tool>> {
    let mut tools = Vec::new();

    tools.extend(notion_tools(notion));
    tools.extend(slack_tools(notifier));
    tools.push(Arc::new(HealthTool::new(health)) as Arc<dyn Tool>);

    tools
}
