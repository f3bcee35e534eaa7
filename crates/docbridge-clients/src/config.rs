//! Bridge configuration.
//!
//! Provides centralized configuration for the Notion and Slack endpoints,
//! credentials, and the watcher's timing knobs. Configuration is loaded from
//! environment variables; credentials are mandatory, everything else has
//! defaults suitable for production use against the public APIs.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default Slack Web API base URL.
pub const DEFAULT_SLACK_API_URL: &str = "https://slack.com/api";

/// Default Notion REST API base URL.
pub const DEFAULT_NOTION_API_URL: &str = "https://api.notion.com/v1";

/// Notion API version sent with every request.
pub const DEFAULT_NOTION_VERSION: &str = "2022-06-28";

/// Channel that receives document change notifications.
pub const DEFAULT_UPDATES_CHANNEL: &str = "notion-page-updates";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing required environment variable.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Slack Web API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackSettings {
    /// Base URL for the Web API (e.g., "https://slack.com/api").
    pub api_url: String,

    /// Bot token (`xoxb-...`) used for every Web API call.
    pub bot_token: String,

    /// App-level token (`xapp-...`).
    pub app_token: String,

    /// Optional allow-list of channel names. `None` means every channel is eligible.
    pub channels: Option<Vec<String>>,
}

impl SlackSettings {
    /// Build a full URL for a Web API method.
    pub fn url(&self, method: &str) -> String {
        join_url(&self.api_url, method)
    }

    /// Whether `channel` may be used by the context tools.
    pub fn channel_allowed(&self, channel: &str) -> bool {
        match &self.channels {
            Some(allowed) => allowed.iter().any(|c| c == channel),
            None => true,
        }
    }
}

/// Notion REST API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionSettings {
    /// Base URL for the REST API (e.g., "https://api.notion.com/v1").
    pub api_url: String,

    /// Integration secret.
    pub api_key: String,

    /// Database watched for changes.
    pub database_id: String,

    /// Value of the `Notion-Version` header.
    pub notion_version: String,
}

impl NotionSettings {
    /// Build a full URL by appending a path to the base URL.
    pub fn url(&self, path: &str) -> String {
        join_url(&self.api_url, path)
    }
}

/// Configuration for the whole bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Slack configuration.
    pub slack: SlackSettings,

    /// Notion configuration.
    pub notion: NotionSettings,

    /// Channel (name or ID) receiving change notifications.
    pub updates_channel: String,

    /// Seconds between the end of one poll cycle and the start of the next.
    pub poll_interval_secs: u64,

    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,

    /// Maximum result pages fetched per poll cycle.
    pub query_max_pages: u32,

    /// Attempts per change query (1 disables retry).
    pub query_retries: u32,
}

impl BridgeConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `SLACK_BOT_TOKEN`: Slack bot token, must start with `xoxb-` (required)
    /// - `SLACK_APP_TOKEN`: Slack app token, must start with `xapp-` (required)
    /// - `SLACK_CHANNELS`: Comma-separated channel allow-list (optional)
    /// - `SLACK_API_URL`: Slack Web API URL (default: https://slack.com/api)
    /// - `NOTION_API_KEY`: Notion integration secret (required)
    /// - `NOTION_DATABASE_ID`: Watched Notion database (required)
    /// - `NOTION_API_URL`: Notion API URL (default: https://api.notion.com/v1)
    /// - `DOCBRIDGE_UPDATES_CHANNEL`: Notification channel (default: notion-page-updates)
    /// - `DOCBRIDGE_POLL_INTERVAL_SECS`: Poll interval in seconds (default: 5)
    /// - `DOCBRIDGE_TIMEOUT_SECS`: Request timeout in seconds (default: 30)
    /// - `DOCBRIDGE_QUERY_MAX_PAGES`: Result pages per poll cycle (default: 1)
    /// - `DOCBRIDGE_QUERY_RETRIES`: Attempts per change query (default: 1)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = required(&lookup, "SLACK_BOT_TOKEN")?;
        require_prefix("SLACK_BOT_TOKEN", &bot_token, "xoxb-")?;

        let app_token = required(&lookup, "SLACK_APP_TOKEN")?;
        require_prefix("SLACK_APP_TOKEN", &app_token, "xapp-")?;

        let channels = lookup("SLACK_CHANNELS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|list| !list.is_empty());

        let config = Self {
            slack: SlackSettings {
                api_url: lookup("SLACK_API_URL")
                    .unwrap_or_else(|| DEFAULT_SLACK_API_URL.to_string()),
                bot_token,
                app_token,
                channels,
            },
            notion: NotionSettings {
                api_url: lookup("NOTION_API_URL")
                    .unwrap_or_else(|| DEFAULT_NOTION_API_URL.to_string()),
                api_key: required(&lookup, "NOTION_API_KEY")?,
                database_id: required(&lookup, "NOTION_DATABASE_ID")?,
                notion_version: DEFAULT_NOTION_VERSION.to_string(),
            },
            updates_channel: lookup("DOCBRIDGE_UPDATES_CHANNEL")
                .unwrap_or_else(|| DEFAULT_UPDATES_CHANNEL.to_string()),
            poll_interval_secs: parsed(&lookup, "DOCBRIDGE_POLL_INTERVAL_SECS", 5)?,
            timeout_secs: parsed(&lookup, "DOCBRIDGE_TIMEOUT_SECS", 30)?,
            query_max_pages: parsed(&lookup, "DOCBRIDGE_QUERY_MAX_PAGES", 1)?,
            query_retries: parsed(&lookup, "DOCBRIDGE_QUERY_RETRIES", 1)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that parsing alone cannot enforce.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(invalid("DOCBRIDGE_POLL_INTERVAL_SECS", "must be at least 1"));
        }
        if self.timeout_secs == 0 {
            return Err(invalid("DOCBRIDGE_TIMEOUT_SECS", "must be at least 1"));
        }
        if self.query_max_pages == 0 {
            return Err(invalid("DOCBRIDGE_QUERY_MAX_PAGES", "must be at least 1"));
        }
        if self.query_retries == 0 {
            return Err(invalid("DOCBRIDGE_QUERY_RETRIES", "must be at least 1"));
        }
        Ok(())
    }

    /// Get the request timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Get the poll interval as a Duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{}/{}", base, path)
}

fn required<F>(lookup: &F, key: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn require_prefix(key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
    if value.starts_with(prefix) {
        Ok(())
    } else {
        Err(invalid(key, &format!("expected a token starting with '{}'", prefix)))
    }
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(key, &e.to_string())),
        _ => Ok(default),
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
