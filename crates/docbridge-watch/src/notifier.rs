//! Notification delivery to Slack.
//!
//! [`Notifier`] is the seam the poller delivers through. [`SlackNotifier`]
//! resolves destinations via the [`ChannelDirectory`] and issues exactly one
//! `chat.postMessage` per send. It never retries.

use crate::directory::ChannelDirectory;
use crate::error::{BridgeError, BridgeResult};
use async_trait::async_trait;
use docbridge_clients::slack::HistoryMessage;
use docbridge_clients::{SlackClient, SlackError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// How many recent messages `search` scans.
pub const SEARCH_WINDOW: u32 = 100;

/// A message located by [`SlackNotifier::search`].
pub type FoundMessage = HistoryMessage;

/// A delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    /// Resolved channel ID.
    pub channel: String,
    /// Message timestamp; usable as a thread anchor for replies.
    pub ts: String,
}

/// Destination for notification messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send `text` to `destination`, as a reply under `thread_ts` when given.
    async fn send(
        &self,
        destination: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> BridgeResult<Delivery>;
}

/// Slack-backed notifier.
pub struct SlackNotifier {
    client: SlackClient,
    directory: RwLock<Arc<ChannelDirectory>>,
}

impl std::fmt::Debug for SlackNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlackNotifier")
            .field("client", &self.client)
            .finish()
    }
}

impl SlackNotifier {
    pub fn new(client: SlackClient, directory: ChannelDirectory) -> Self {
        Self {
            client,
            directory: RwLock::new(Arc::new(directory)),
        }
    }

    pub fn client(&self) -> &SlackClient {
        &self.client
    }

    /// Current directory snapshot.
    pub async fn directory(&self) -> Arc<ChannelDirectory> {
        self.directory.read().await.clone()
    }

    /// Resolve a channel name or ID through the directory.
    pub async fn resolve(&self, destination: &str) -> String {
        self.directory().await.resolve(destination).to_string()
    }

    /// Re-enumerate channels and swap in a fresh directory.
    ///
    /// On failure the previous directory stays in place.
    pub async fn refresh_directory(&self) -> Result<usize, SlackError> {
        let fresh = ChannelDirectory::load(&self.client).await?;
        let count = fresh.len();
        *self.directory.write().await = Arc::new(fresh);
        info!(channels = count, "Channel directory refreshed");
        Ok(count)
    }

    /// Most recent `limit` messages of a channel, newest first.
    pub async fn history(
        &self,
        destination: &str,
        limit: u32,
    ) -> Result<Vec<HistoryMessage>, SlackError> {
        let channel = self.resolve(destination).await;
        self.client.history(&channel, limit).await
    }

    /// First message among the last [`SEARCH_WINDOW`] whose text contains
    /// `substring`, ignoring case. Older history is not searched.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        destination: &str,
        substring: &str,
    ) -> Result<Option<FoundMessage>, SlackError> {
        let messages = self.history(destination, SEARCH_WINDOW).await?;
        debug!(scanned = messages.len(), "Searching channel history");

        let found = find_message(messages, substring);
        if found.is_none() {
            debug!("No message found containing {:?}", substring);
        }
        Ok(found)
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    #[instrument(skip(self, text), fields(len = text.len()))]
    async fn send(
        &self,
        destination: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> BridgeResult<Delivery> {
        let channel = self.resolve(destination).await;

        match self.client.post_message(&channel, text, thread_ts).await {
            Ok(posted) => Ok(Delivery {
                channel: posted.channel,
                ts: posted.ts,
            }),
            Err(e) => {
                warn!(channel = %destination, error = %e, "Slack delivery failed");
                Err(BridgeError::delivery(destination, e))
            }
        }
    }
}

fn find_message(messages: Vec<HistoryMessage>, substring: &str) -> Option<HistoryMessage> {
    let needle = substring.to_lowercase();
    messages
        .into_iter()
        .find(|m| m.text.to_lowercase().contains(&needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(ts: &str, text: &str) -> HistoryMessage {
        HistoryMessage {
            text: text.to_string(),
            user: Some("U1".to_string()),
            ts: ts.to_string(),
            thread_ts: None,
        }
    }

    #[test]
    fn test_find_is_case_insensitive_and_first_wins() {
        let messages = vec![
            msg("3", "nothing here"),
            msg("2", "Release NOTES posted"),
            msg("1", "release notes draft"),
        ];
        let found = find_message(messages, "release notes").unwrap();
        assert_eq!(found.ts, "2");
    }

    #[test]
    fn test_find_none() {
        assert!(find_message(vec![msg("1", "hello")], "bye").is_none());
        assert!(find_message(vec![], "x").is_none());
    }
}
