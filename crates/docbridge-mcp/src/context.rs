//! Slack channel context for assistants.
//!
//! Reads recent channel history and posts messages on an assistant's behalf.
//! Responses are plain JSON objects; problems are reported inside them as an
//! `error` field rather than as Rust errors.

use docbridge_watch::{Notifier, SlackNotifier};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, instrument, warn};

/// Messages returned by [`SlackContextProvider::get_context`].
pub const CONTEXT_MESSAGES: u32 = 10;

/// Parameters accepted by both operations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContextRequest {
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One history message in the context payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextMessage {
    pub text: String,
    pub user: Option<String>,
    pub timestamp: String,
    pub thread_ts: Option<String>,
}

/// Context provider backed by the bridge's Slack notifier.
#[derive(Debug, Clone)]
pub struct SlackContextProvider {
    notifier: Arc<SlackNotifier>,
}

impl SlackContextProvider {
    pub fn new(notifier: Arc<SlackNotifier>) -> Self {
        Self { notifier }
    }

    /// Last [`CONTEXT_MESSAGES`] messages of `channel`, newest first.
    ///
    /// A failed history read yields an empty message list.
    #[instrument(skip(self, request), fields(channel = request.channel.as_deref()))]
    pub async fn get_context(&self, request: ContextRequest) -> Value {
        let Some(channel) = non_blank(request.channel) else {
            return json!({ "error": "Channel parameter is required" });
        };
        if let Some(rejected) = self.reject(&channel).await {
            return rejected;
        }

        let messages: Vec<ContextMessage> =
            match self.notifier.history(&channel, CONTEXT_MESSAGES).await {
                Ok(history) => history
                    .into_iter()
                    .map(|m| ContextMessage {
                        text: m.text,
                        user: m.user,
                        timestamp: m.ts,
                        thread_ts: m.thread_ts,
                    })
                    .collect(),
                Err(e) => {
                    warn!(error = %e, "Channel history unavailable; returning empty context");
                    Vec::new()
                }
            };

        json!({
            "channel": channel,
            "messageCount": messages.len(),
            "messages": messages,
        })
    }

    /// Post `message` to `channel`.
    #[instrument(skip(self, request), fields(channel = request.channel.as_deref()))]
    pub async fn update_context(&self, request: ContextRequest) -> Value {
        let (Some(channel), Some(message)) =
            (non_blank(request.channel), non_blank(request.message))
        else {
            return json!({ "error": "Both channel and message parameters are required" });
        };
        if let Some(rejected) = self.reject(&channel).await {
            return rejected;
        }

        match self.notifier.send(&channel, &message, None).await {
            Ok(_) => json!({
                "success": true,
                "channel": channel,
                "messageLength": message.chars().count(),
            }),
            Err(e) => {
                error!(error = %e, "Failed to update Slack context");
                json!({
                    "error": "Failed to update Slack context",
                    "details": e.to_string(),
                })
            }
        }
    }

    /// Whether `channel` passes the configured allow-list, by name or ID.
    pub async fn is_allowed(&self, channel: &str) -> bool {
        let settings = self.notifier.client().settings();
        let Some(allowed) = &settings.channels else {
            return true;
        };
        if settings.channel_allowed(channel) {
            return true;
        }

        let directory = self.notifier.directory().await;
        let target = directory.resolve(channel);
        allowed.iter().any(|entry| directory.resolve(entry) == target)
    }

    async fn reject(&self, channel: &str) -> Option<Value> {
        if self.is_allowed(channel).await {
            return None;
        }
        warn!("Channel outside the configured allow-list");
        Some(json!({ "error": format!("Channel {} is not in the allowed channel list", channel) }))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some("  ".into())), None);
        assert_eq!(non_blank(Some("general".into())).as_deref(), Some("general"));
    }

    #[test]
    fn test_context_message_wire_names() {
        let msg = ContextMessage {
            text: "hi".into(),
            user: Some("U1".into()),
            timestamp: "1.0".into(),
            thread_ts: None,
        };
        let wire = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            wire,
            json!({ "text": "hi", "user": "U1", "timestamp": "1.0", "threadTs": null })
        );
    }

    #[test]
    fn test_request_tolerates_missing_fields() {
        let req: ContextRequest = serde_json::from_value(json!({})).unwrap();
        assert!(req.channel.is_none());
        assert!(req.message.is_none());
    }
}
