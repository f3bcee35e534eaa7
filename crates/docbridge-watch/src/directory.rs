//! Channel name to channel ID lookup.
//!
//! Built once from `conversations.list` and never mutated. Private and
//! archived channels are not listed, so they resolve by pass-through only.

use docbridge_clients::slack::Channel;
use docbridge_clients::{SlackClient, SlackError};
use std::collections::HashMap;
use tracing::{debug, info};

/// Immutable channel lookup table.
#[derive(Debug, Clone, Default)]
pub struct ChannelDirectory {
    /// Keyed by channel name and by channel ID, both mapping to the ID.
    entries: HashMap<String, String>,
    channels: usize,
}

impl ChannelDirectory {
    /// Build a directory from known channels.
    pub fn from_channels<I>(channels: I) -> Self
    where
        I: IntoIterator<Item = Channel>,
    {
        let mut entries = HashMap::new();
        let mut count = 0;
        for channel in channels {
            entries.insert(channel.name, channel.id.clone());
            entries.insert(channel.id.clone(), channel.id);
            count += 1;
        }
        Self {
            entries,
            channels: count,
        }
    }

    /// Enumerate the workspace's public channels.
    pub async fn load(client: &SlackClient) -> Result<Self, SlackError> {
        let channels = client.list_public_channels().await?;
        for channel in &channels {
            debug!(name = %channel.name, id = %channel.id, "Cached channel");
        }
        let directory = Self::from_channels(channels);
        info!(channels = directory.len(), "Cached Slack channels");
        Ok(directory)
    }

    /// Resolve a channel name or ID. Unknown input is returned unchanged.
    pub fn resolve<'a>(&'a self, name_or_id: &'a str) -> &'a str {
        let key = name_or_id.strip_prefix('#').unwrap_or(name_or_id);
        self.entries
            .get(key)
            .map(String::as_str)
            .unwrap_or(name_or_id)
    }

    pub fn contains(&self, name_or_id: &str) -> bool {
        let key = name_or_id.strip_prefix('#').unwrap_or(name_or_id);
        self.entries.contains_key(key)
    }

    /// Number of channels (not lookup keys).
    pub fn len(&self) -> usize {
        self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.channels == 0
    }
}
