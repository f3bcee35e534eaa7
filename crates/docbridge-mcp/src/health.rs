//! Platform health checks.
//!
//! Probes both platforms with a cheap authenticated call:
//!
//! - **Slack**: `auth.test` confirms the bot token
//! - **Notion**: retrieving the watched database confirms the integration
//!   key and that the database is shared with it
//!
//! At startup [`HealthChecker::ensure_ready`] turns any failed probe into a
//! fatal [`BridgeError::AuthFailed`]. At runtime the same report is served by
//! the `bridge-health` tool.
//!
//! ```rust,no_run
//! use docbridge_mcp::health::HealthChecker;
//!
//! async fn check(checker: &HealthChecker) {
//!     let report = checker.check_all().await;
//!     for service in &report.services {
//!         println!("{}: {:?} ({}ms)", service.name, service.status, service.latency_ms);
//!     }
//! }
//! ```

use crate::server::{McpServerResult, Tool, ToolContext};
use crate::types::{ToolDefinition, ToolResult};
use async_trait::async_trait;
use docbridge_clients::notion::database_title;
use docbridge_clients::{NotionClient, SlackClient};
use docbridge_watch::{BridgeError, BridgeResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument};

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Both platforms reachable.
    Healthy,
    /// At least one platform failed its probe.
    Unhealthy,
}

/// Individual platform status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Up,
    Down,
}

/// Probe result for one platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    /// Platform name ("slack" or "notion").
    pub name: String,

    pub status: ServiceStatus,

    /// Probe round-trip in milliseconds.
    pub latency_ms: u64,

    /// What the probe saw, e.g. the bot identity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceHealth {
    fn up(name: &str, started: Instant, detail: String) -> Self {
        Self {
            name: name.to_string(),
            status: ServiceStatus::Up,
            latency_ms: started.elapsed().as_millis() as u64,
            detail: Some(detail),
            error: None,
        }
    }

    fn down(name: &str, started: Instant, error: String) -> Self {
        Self {
            name: name.to_string(),
            status: ServiceStatus::Down,
            latency_ms: started.elapsed().as_millis() as u64,
            detail: None,
            error: Some(error),
        }
    }
}

/// Aggregated health check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,

    /// Timestamp of the check (RFC 3339).
    pub timestamp: String,

    pub services: Vec<ServiceHealth>,

    /// Total check duration in milliseconds.
    pub check_duration_ms: u64,

    /// Crate version.
    pub version: String,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }

    /// First platform whose probe failed.
    pub fn first_failure(&self) -> Option<&ServiceHealth> {
        self.services
            .iter()
            .find(|s| s.status == ServiceStatus::Down)
    }
}

/// Health checker for both platforms.
#[derive(Debug, Clone)]
pub struct HealthChecker {
    slack: SlackClient,
    notion: NotionClient,
}

impl HealthChecker {
    pub fn new(slack: SlackClient, notion: NotionClient) -> Self {
        Self { slack, notion }
    }

    /// Probe both platforms concurrently.
    #[instrument(skip(self))]
    pub async fn check_all(&self) -> HealthReport {
        let start = Instant::now();

        let (slack, notion) = tokio::join!(self.check_slack(), self.check_notion());
        let services = vec![slack, notion];

        let status = if services.iter().all(|s| s.status == ServiceStatus::Up) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };
        let duration = start.elapsed();

        info!(
            status = ?status,
            duration_ms = duration.as_millis() as u64,
            "Health check complete"
        );

        HealthReport {
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
            services,
            check_duration_ms: duration.as_millis() as u64,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Probe both platforms; fail with [`BridgeError::AuthFailed`] naming the
    /// first platform that did not answer.
    pub async fn ensure_ready(&self) -> BridgeResult<HealthReport> {
        let report = self.check_all().await;
        if let Some(failed) = report.first_failure() {
            return Err(BridgeError::auth(
                &failed.name,
                failed.error.as_deref().unwrap_or("probe failed"),
            ));
        }
        Ok(report)
    }

    async fn check_slack(&self) -> ServiceHealth {
        let started = Instant::now();
        match self.slack.auth_test().await {
            Ok(me) => {
                info!(user = %me.user, team = %me.team, "Connected to Slack");
                ServiceHealth::up(
                    "slack",
                    started,
                    format!("connected as {} in team {}", me.user, me.team),
                )
            }
            Err(e) => {
                error!(error = %e, "Slack probe failed");
                ServiceHealth::down("slack", started, e.to_string())
            }
        }
    }

    async fn check_notion(&self) -> ServiceHealth {
        let started = Instant::now();
        let database_id = self.notion.database_id();
        match self.notion.retrieve_database(database_id).await {
            Ok(database) => {
                let title = database_title(&database).unwrap_or_else(|| database_id.to_string());
                info!(database = %title, "Connected to Notion");
                ServiceHealth::up("notion", started, format!("watching database {}", title))
            }
            Err(e) => {
                error!(error = %e, "Notion probe failed");
                ServiceHealth::down("notion", started, e.to_string())
            }
        }
    }
}

/// `bridge-health` tool.
pub struct HealthTool {
    checker: Arc<HealthChecker>,
}

impl HealthTool {
    pub fn new(checker: Arc<HealthChecker>) -> Self {
        Self { checker }
    }
}

#[async_trait]
impl Tool for HealthTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "bridge-health",
            "Check connectivity to Slack and Notion",
        )
        .with_category("bridge")
    }

    async fn execute(&self, _args: Value, _context: &ToolContext) -> McpServerResult<ToolResult> {
        let report = self.checker.check_all().await;
        let value = serde_json::to_value(&report)
            .map_err(|e| crate::server::McpServerError::Internal(e.to_string()))?;

        let mut result = ToolResult::json(&value);
        result.is_error = !report.is_healthy();
        Ok(result)
    }
}
