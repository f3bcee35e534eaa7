//! Slack service client.
//!
//! HTTP client for the handful of Slack Web API methods the bridge needs:
//! identity probing, channel enumeration, posting messages and reading
//! channel history. Slack reports most failures as HTTP 200 with
//! `"ok": false`, so every response envelope is checked explicitly.

use super::config::SlackSettings;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

/// Page size requested from `conversations.list`.
const CHANNEL_PAGE_LIMIT: u32 = 200;

/// Slack client errors.
#[derive(Debug, Error)]
pub enum SlackError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Non-success HTTP status (rate limiting, outages, bad token on some methods).
    #[error("HTTP error ({status}): {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body or reason.
        message: String,
    },

    /// Slack answered `"ok": false`.
    #[error("Slack API error in {method}: {error}")]
    Api {
        /// Web API method.
        method: String,
        /// Slack error code (e.g. "channel_not_found").
        error: String,
    },

    /// Invalid response from the API.
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),
}

/// Slack service client.
#[derive(Clone)]
pub struct SlackClient {
    /// HTTP client instance.
    client: Client,

    /// API configuration.
    settings: SlackSettings,
}

impl std::fmt::Debug for SlackClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackClient")
            .field("api_url", &self.settings.api_url)
            .finish()
    }
}

impl SlackClient {
    /// Create a new Slack client.
    pub fn new(settings: SlackSettings, timeout: Duration) -> Result<Self, SlackError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, settings })
    }

    /// Settings this client was built from.
    pub fn settings(&self) -> &SlackSettings {
        &self.settings
    }

    /// Verify the bot token and report who we are.
    #[instrument(skip(self))]
    pub async fn auth_test(&self) -> Result<AuthIdentity, SlackError> {
        let response = self
            .client
            .post(self.settings.url("auth.test"))
            .bearer_auth(&self.settings.bot_token)
            .send()
            .await?;
        self.handle_response("auth.test", response).await
    }

    /// List all non-archived public channels, following pagination cursors.
    #[instrument(skip(self))]
    pub async fn list_public_channels(&self) -> Result<Vec<Channel>, SlackError> {
        let mut channels = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![
                ("types", "public_channel".to_string()),
                ("exclude_archived", "true".to_string()),
                ("limit", CHANNEL_PAGE_LIMIT.to_string()),
            ];
            if let Some(ref c) = cursor {
                query.push(("cursor", c.clone()));
            }

            let response = self
                .client
                .get(self.settings.url("conversations.list"))
                .bearer_auth(&self.settings.bot_token)
                .query(&query)
                .send()
                .await?;
            let page: ChannelPage = self.handle_response("conversations.list", response).await?;
            channels.extend(page.channels);

            cursor = page
                .response_metadata
                .and_then(|m| m.next_cursor)
                .filter(|c| !c.is_empty());
            if cursor.is_none() {
                break;
            }
        }

        debug!("Listed {} public channels", channels.len());
        Ok(channels)
    }

    /// Post a message, as a threaded reply when `thread_ts` is given.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn post_message(
        &self,
        channel: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<PostedMessage, SlackError> {
        let body = PostMessageBody {
            channel,
            text,
            thread_ts,
        };
        let response = self
            .client
            .post(self.settings.url("chat.postMessage"))
            .bearer_auth(&self.settings.bot_token)
            .json(&body)
            .send()
            .await?;
        self.handle_response("chat.postMessage", response).await
    }

    /// Fetch the most recent `limit` messages of a channel, newest first.
    #[instrument(skip(self))]
    pub async fn history(
        &self,
        channel: &str,
        limit: u32,
    ) -> Result<Vec<HistoryMessage>, SlackError> {
        let response = self
            .client
            .get(self.settings.url("conversations.history"))
            .bearer_auth(&self.settings.bot_token)
            .query(&[("channel", channel.to_string()), ("limit", limit.to_string())])
            .send()
            .await?;
        let page: HistoryPage = self
            .handle_response("conversations.history", response)
            .await?;
        Ok(page.messages)
    }

    /// Check the HTTP status and the `ok` envelope, then decode the payload.
    async fn handle_response<T>(
        &self,
        method: &str,
        response: reqwest::Response,
    ) -> Result<T, SlackError>
    where
        T: DeserializeOwned,
    {
        let status = response.status();

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            warn!("Slack HTTP error in {} ({}): {}", method, status.as_u16(), message);
            return Err(SlackError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SlackError::InvalidResponse(e.to_string()))?;

        if body.get("ok").and_then(Value::as_bool) != Some(true) {
            let code = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown_error")
                .to_string();
            error!("Slack API error in {}: {}", method, code);
            return Err(SlackError::Api {
                method: method.to_string(),
                error: code,
            });
        }

        serde_json::from_value(body).map_err(|e| SlackError::InvalidResponse(e.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct PostMessageBody<'a> {
    channel: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<&'a str>,
}

/// Result of `auth.test`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthIdentity {
    /// Bot user name.
    #[serde(default)]
    pub user: String,

    /// Workspace name.
    #[serde(default)]
    pub team: String,

    /// Bot user ID.
    #[serde(default)]
    pub user_id: String,

    /// Workspace ID.
    #[serde(default)]
    pub team_id: String,
}

/// A conversation from `conversations.list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Channel ID (e.g. "C0123ABC").
    pub id: String,

    /// Channel name without the leading '#'.
    pub name: String,
}

impl Channel {
    /// Create a channel entry.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChannelPage {
    #[serde(default)]
    channels: Vec<Channel>,
    #[serde(default)]
    response_metadata: Option<ResponseMetadata>,
}

#[derive(Debug, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: Option<String>,
}

/// Result of `chat.postMessage`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostedMessage {
    /// Channel ID the message landed in.
    pub channel: String,

    /// Message timestamp, usable as a thread anchor.
    pub ts: String,
}

/// A message from `conversations.history`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    /// Message text.
    #[serde(default)]
    pub text: String,

    /// Author user ID (absent for some bot messages).
    #[serde(default)]
    pub user: Option<String>,

    /// Message timestamp.
    pub ts: String,

    /// Parent thread timestamp, if the message is part of a thread.
    #[serde(default)]
    pub thread_ts: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryPage {
    #[serde(default)]
    messages: Vec<HistoryMessage>,
}
