//! Remote store change queries.
//!
//! [`ChangeSource`] is the seam the poller queries through.
//! [`NotionChangeSource`] issues the "edited after" database query and maps
//! pages into [`ChangeRecord`]s; [`RetryingSource`] is an opt-in backoff layer
//! that wraps any source without the poller knowing about it.

use crate::error::{BridgeError, BridgeResult};
use crate::record::ChangeRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use docbridge_clients::notion::{DatabaseQuery, Page};
use docbridge_clients::{with_retry_if, NotionClient, RetryConfig};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

/// Source of changed records.
#[async_trait]
pub trait ChangeSource: Send + Sync {
    /// Records last modified strictly after `since`, most recent first.
    async fn query_changed_since(
        &self,
        store_id: &str,
        since: DateTime<Utc>,
    ) -> BridgeResult<Vec<ChangeRecord>>;
}

/// Names of the database properties read into a [`ChangeRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyNames {
    /// Title property.
    pub title: String,
    /// Multi-select category property.
    pub category: String,
    /// Status (or select) property.
    pub status: String,
    /// Rich-text author property.
    pub author: String,
}

impl Default for PropertyNames {
    fn default() -> Self {
        Self {
            title: "Doc name".to_string(),
            category: "Category".to_string(),
            status: "Status".to_string(),
            author: "Author".to_string(),
        }
    }
}

impl PropertyNames {
    /// Map a Notion page into a change record. Absent or oddly-typed
    /// properties become `None`/empty rather than errors.
    pub fn record_from(&self, page: &Page) -> ChangeRecord {
        let props = &page.properties;

        ChangeRecord {
            id: page.id.clone(),
            title: props
                .get(&self.title)
                .or_else(|| find_title_property(props))
                .and_then(|p| p.get("title"))
                .and_then(plain_text),
            created_time: page.created_time,
            last_edited_time: page.last_edited_time,
            last_edited_by: page.last_edited_by.as_ref().and_then(|u| u.name.clone()),
            status: props.get(&self.status).and_then(|p| {
                p.get("status")
                    .or_else(|| p.get("select"))
                    .and_then(|s| s.get("name"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            }),
            categories: props
                .get(&self.category)
                .and_then(|p| p.get("multi_select"))
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|i| i.get("name").and_then(Value::as_str))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            author: props
                .get(&self.author)
                .and_then(|p| p.get("rich_text"))
                .and_then(plain_text),
            url: page.url.clone(),
        }
    }
}

/// Every database has exactly one title-typed property; use it when the
/// configured name is missing.
fn find_title_property(props: &Map<String, Value>) -> Option<&Value> {
    props
        .values()
        .find(|p| p.get("type").and_then(Value::as_str) == Some("title"))
}

fn plain_text(rich_text: &Value) -> Option<String> {
    let text: String = rich_text
        .as_array()?
        .iter()
        .filter_map(|part| part.get("plain_text").and_then(Value::as_str))
        .collect();
    (!text.is_empty()).then_some(text)
}

/// Notion database query source.
#[derive(Debug, Clone)]
pub struct NotionChangeSource {
    client: NotionClient,
    properties: PropertyNames,
    max_pages: u32,
}

impl NotionChangeSource {
    /// Create a source reading one result page per query.
    pub fn new(client: NotionClient) -> Self {
        Self {
            client,
            properties: PropertyNames::default(),
            max_pages: 1,
        }
    }

    /// Follow up to `max_pages` result pages per query.
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn with_properties(mut self, properties: PropertyNames) -> Self {
        self.properties = properties;
        self
    }
}

#[async_trait]
impl ChangeSource for NotionChangeSource {
    #[instrument(skip(self, since), fields(since = %since))]
    async fn query_changed_since(
        &self,
        store_id: &str,
        since: DateTime<Utc>,
    ) -> BridgeResult<Vec<ChangeRecord>> {
        let mut query = DatabaseQuery::edited_after(since);
        let mut records = Vec::new();

        for page_number in 1..=self.max_pages {
            let response = self
                .client
                .query_database(store_id, &query)
                .await
                .map_err(|e| BridgeError::query(store_id, e))?;

            records.extend(response.results.iter().map(|p| self.properties.record_from(p)));

            if !response.has_more {
                break;
            }
            match response.next_cursor {
                Some(cursor) if page_number < self.max_pages => {
                    query = query.with_cursor(cursor);
                }
                _ => {
                    // Descending order: whatever is left is the oldest changes.
                    warn!(
                        pages = page_number,
                        fetched = records.len(),
                        "More changed records than the page limit; oldest are skipped"
                    );
                    break;
                }
            }
        }

        debug!(count = records.len(), "Queried changed records");
        Ok(records)
    }
}

/// Retries query failures of the wrapped source with exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryingSource<S> {
    inner: S,
    config: RetryConfig,
}

impl<S: ChangeSource> RetryingSource<S> {
    pub fn new(inner: S, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

#[async_trait]
impl<S: ChangeSource> ChangeSource for RetryingSource<S> {
    async fn query_changed_since(
        &self,
        store_id: &str,
        since: DateTime<Utc>,
    ) -> BridgeResult<Vec<ChangeRecord>> {
        with_retry_if(
            &self.config,
            || self.inner.query_changed_since(store_id, since),
            |e| matches!(e, BridgeError::QueryFailed { .. }),
        )
        .await
    }
}
