//! Change records and their notification text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TITLE: &str = "Untitled Document";
pub const DEFAULT_CATEGORY: &str = "Uncategorized";
pub const DEFAULT_STATUS: &str = "No status";
pub const DEFAULT_PERSON: &str = "Unknown";

/// Snapshot of one document as seen by a single poll cycle.
///
/// Every descriptive field is optional; formatting substitutes defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Stable document identifier.
    pub id: String,

    /// Display title.
    pub title: Option<String>,

    /// Creation time.
    pub created_time: DateTime<Utc>,

    /// Last modification time.
    pub last_edited_time: DateTime<Utc>,

    /// Name of whoever made the last modification.
    pub last_edited_by: Option<String>,

    /// Workflow status.
    pub status: Option<String>,

    /// Category tags, in the order the store returns them.
    pub categories: Vec<String>,

    /// Document author.
    pub author: Option<String>,

    /// Canonical view URL.
    pub url: String,
}

/// Whether a record was just created or edited after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    New,
    Updated,
}

impl ChangeKind {
    fn marker(self) -> &'static str {
        match self {
            ChangeKind::New => "🆕",
            ChangeKind::Updated => "📝",
        }
    }

    fn headline(self) -> &'static str {
        match self {
            ChangeKind::New => "New document created",
            ChangeKind::Updated => "Document updated",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::New => f.write_str("new"),
            ChangeKind::Updated => f.write_str("updated"),
        }
    }
}

impl ChangeRecord {
    /// `New` iff created and last-edited timestamps are exactly equal.
    ///
    /// This is a heuristic: a store that always stamps a later edit time on
    /// creation makes every record look `Updated`.
    pub fn kind(&self) -> ChangeKind {
        if self.created_time == self.last_edited_time {
            ChangeKind::New
        } else {
            ChangeKind::Updated
        }
    }

    pub fn display_title(&self) -> &str {
        non_empty(self.title.as_deref()).unwrap_or(DEFAULT_TITLE)
    }

    pub fn display_category(&self) -> String {
        let joined = self
            .categories
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        if joined.is_empty() {
            DEFAULT_CATEGORY.to_string()
        } else {
            joined
        }
    }

    pub fn display_status(&self) -> &str {
        non_empty(self.status.as_deref()).unwrap_or(DEFAULT_STATUS)
    }

    pub fn display_author(&self) -> &str {
        non_empty(self.author.as_deref()).unwrap_or(DEFAULT_PERSON)
    }

    pub fn display_editor(&self) -> &str {
        non_empty(self.last_edited_by.as_deref()).unwrap_or(DEFAULT_PERSON)
    }

    /// Build the Slack message announcing this change.
    pub fn notification(&self) -> NotificationMessage {
        let kind = self.kind();
        let edited = self.last_edited_time.format("%Y-%m-%d %H:%M:%S UTC");

        NotificationMessage {
            lines: vec![
                format!(
                    "{} {}: *{}*",
                    kind.marker(),
                    kind.headline(),
                    self.display_title()
                ),
                format!("🔗 <{}|View in Notion>", self.url),
                String::new(),
                "📋 *Details:*".to_string(),
                format!("• Category: {}", self.display_category()),
                format!("• Status: {}", self.display_status()),
                format!("• Author: {}", self.display_author()),
                format!("• Last edited by: {}", self.display_editor()),
                format!("• Last edited: {}", edited),
            ],
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Ordered lines of a notification. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    pub lines: Vec<String>,
}

impl NotificationMessage {
    pub fn header(&self) -> &str {
        self.lines.first().map(String::as_str).unwrap_or_default()
    }

    /// Message body as sent to Slack.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

impl std::fmt::Display for NotificationMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text())
    }
}
