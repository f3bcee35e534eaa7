//! Notion service client.
//!
//! HTTP client for the Notion REST API. Typed access is provided for the
//! database query used by the change watcher; the remaining operations are
//! pass-through calls that hand back the raw JSON document so tool callers
//! see exactly what Notion returned.

use super::config::NotionSettings;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, instrument, warn};

/// Emoji used when a database icon is requested without one.
pub const DEFAULT_DATABASE_EMOJI: &str = "📄";

/// Default page size for list/search style calls.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Notion client errors.
#[derive(Debug, Error)]
pub enum NotionError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error ({status} {code}): {message}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Notion error code (e.g. "validation_error").
        code: String,
        /// Error message from the API.
        message: String,
    },

    /// Invalid response from the API.
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Object not found or not shared with the integration.
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Authentication failed.
    #[error("Authentication failed")]
    AuthenticationFailed,
}

/// Notion service client.
#[derive(Clone)]
pub struct NotionClient {
    /// HTTP client instance.
    client: Client,

    /// API configuration.
    settings: NotionSettings,
}

impl std::fmt::Debug for NotionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotionClient")
            .field("api_url", &self.settings.api_url)
            .field("database_id", &self.settings.database_id)
            .finish()
    }
}

impl NotionClient {
    /// Create a new Notion client.
    pub fn new(settings: NotionSettings, timeout: Duration) -> Result<Self, NotionError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, settings })
    }

    /// The database configured for change watching.
    pub fn database_id(&self) -> &str {
        &self.settings.database_id
    }

    /// Retrieve a database object.
    #[instrument(skip(self))]
    pub async fn retrieve_database(&self, database_id: &str) -> Result<Value, NotionError> {
        let path = format!("/databases/{}", normalize_id(database_id));
        self.send(Method::GET, &path, None).await
    }

    /// Query a database and decode the result pages.
    #[instrument(skip(self, query))]
    pub async fn query_database(
        &self,
        database_id: &str,
        query: &DatabaseQuery,
    ) -> Result<QueryResponse<Page>, NotionError> {
        let body = serde_json::to_value(query)
            .map_err(|e| NotionError::InvalidResponse(e.to_string()))?;
        let raw = self.query_database_raw(database_id, body).await?;
        serde_json::from_value(raw).map_err(|e| NotionError::InvalidResponse(e.to_string()))
    }

    /// Query a database with a caller-supplied body.
    #[instrument(skip(self, body))]
    pub async fn query_database_raw(
        &self,
        database_id: &str,
        body: Value,
    ) -> Result<Value, NotionError> {
        let path = format!("/databases/{}/query", normalize_id(database_id));
        self.send(Method::POST, &path, Some(body)).await
    }

    /// List every database shared with the integration, most recently edited first.
    #[instrument(skip(self))]
    pub async fn list_databases(&self) -> Result<Value, NotionError> {
        let params = SearchParams {
            query: String::new(),
            filter: Some(json!({ "property": "object", "value": "database" })),
            sort: Some(json!({ "direction": "descending", "timestamp": "last_edited_time" })),
            start_cursor: None,
            page_size: Some(DEFAULT_PAGE_SIZE),
        };
        self.search(&params).await
    }

    /// Create a page inside a database.
    #[instrument(skip(self, properties, children))]
    pub async fn create_page(
        &self,
        database_id: &str,
        properties: Value,
        children: Option<Value>,
    ) -> Result<Value, NotionError> {
        let mut body = json!({
            "parent": { "database_id": normalize_id(database_id) },
            "properties": properties,
        });
        if let Some(children) = children {
            body["children"] = children;
        }
        self.send(Method::POST, "/pages", Some(body)).await
    }

    /// Update page properties, optionally archiving the page.
    #[instrument(skip(self, properties))]
    pub async fn update_page(
        &self,
        page_id: &str,
        properties: Value,
        archived: Option<bool>,
    ) -> Result<Value, NotionError> {
        let mut body = json!({ "properties": properties });
        if let Some(archived) = archived {
            body["archived"] = Value::Bool(archived);
        }
        let path = format!("/pages/{}", normalize_id(page_id));
        self.send(Method::PATCH, &path, Some(body)).await
    }

    /// Retrieve a page object.
    #[instrument(skip(self))]
    pub async fn retrieve_page(&self, page_id: &str) -> Result<Value, NotionError> {
        let path = format!("/pages/{}", normalize_id(page_id));
        self.send(Method::GET, &path, None).await
    }

    /// Create a database under a parent page.
    #[instrument(skip(self, params), fields(parent_id = %params.parent_id))]
    pub async fn create_database(&self, params: CreateDatabaseParams) -> Result<Value, NotionError> {
        let mut body = json!({
            "parent": { "type": "page_id", "page_id": normalize_id(&params.parent_id) },
            "title": params.title,
            "properties": params.properties,
        });
        if let Some(icon) = params.icon {
            body["icon"] = with_default_emoji(icon);
        }
        if let Some(cover) = params.cover {
            body["cover"] = cover;
        }
        self.send(Method::POST, "/databases", Some(body)).await
    }

    /// Update a database's title, description or property schema.
    #[instrument(skip(self, params), fields(database_id = %params.database_id))]
    pub async fn update_database(&self, params: UpdateDatabaseParams) -> Result<Value, NotionError> {
        let mut body = Map::new();
        if let Some(title) = params.title {
            body.insert("title".to_string(), title);
        }
        if let Some(description) = params.description {
            body.insert("description".to_string(), description);
        }
        if let Some(properties) = params.properties {
            body.insert("properties".to_string(), properties);
        }
        let path = format!("/databases/{}", normalize_id(&params.database_id));
        self.send(Method::PATCH, &path, Some(Value::Object(body))).await
    }

    /// List the children of a block (or page).
    #[instrument(skip(self))]
    pub async fn list_block_children(
        &self,
        block_id: &str,
        start_cursor: Option<&str>,
        page_size: Option<u32>,
    ) -> Result<Value, NotionError> {
        let mut path = format!(
            "/blocks/{}/children?page_size={}",
            normalize_id(block_id),
            page_size.unwrap_or(DEFAULT_PAGE_SIZE)
        );
        if let Some(cursor) = start_cursor {
            path.push_str("&start_cursor=");
            path.push_str(cursor);
        }
        self.send(Method::GET, &path, None).await
    }

    /// Append blocks to a parent block, optionally after an existing child.
    #[instrument(skip(self, children))]
    pub async fn append_block_children(
        &self,
        block_id: &str,
        children: Value,
        after: Option<&str>,
    ) -> Result<Value, NotionError> {
        let mut body = json!({ "children": children });
        if let Some(after) = after {
            body["after"] = Value::String(normalize_id(after));
        }
        let path = format!("/blocks/{}/children", normalize_id(block_id));
        self.send(Method::PATCH, &path, Some(body)).await
    }

    /// Retrieve a block object.
    #[instrument(skip(self))]
    pub async fn retrieve_block(&self, block_id: &str) -> Result<Value, NotionError> {
        let path = format!("/blocks/{}", normalize_id(block_id));
        self.send(Method::GET, &path, None).await
    }

    /// Replace a block's typed content and/or archive state.
    #[instrument(skip(self, content))]
    pub async fn update_block(
        &self,
        block_id: &str,
        block_type: &str,
        content: Value,
        archived: Option<bool>,
    ) -> Result<Value, NotionError> {
        let mut body = Map::new();
        body.insert(block_type.to_string(), content);
        if let Some(archived) = archived {
            body.insert("archived".to_string(), Value::Bool(archived));
        }
        let path = format!("/blocks/{}", normalize_id(block_id));
        self.send(Method::PATCH, &path, Some(Value::Object(body))).await
    }

    /// Search pages and databases by title.
    #[instrument(skip(self, params), fields(query = %params.query))]
    pub async fn search(&self, params: &SearchParams) -> Result<Value, NotionError> {
        let body = serde_json::to_value(params)
            .map_err(|e| NotionError::InvalidResponse(e.to_string()))?;
        self.send(Method::POST, "/search", Some(body)).await
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, NotionError> {
        debug!(%method, path, "Notion request");

        let url = self.settings.url(path);
        let mut request = self
            .client
            .request(method, &url)
            .header("Authorization", format!("Bearer {}", self.settings.api_key))
            .header("Notion-Version", &self.settings.notion_version);

        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        self.handle_response(response, path).await
    }

    /// Handle API response and parse JSON.
    async fn handle_response<T>(
        &self,
        response: reqwest::Response,
        path: &str,
    ) -> Result<T, NotionError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            error!("Notion authentication failed");
            return Err(NotionError::AuthenticationFailed);
        }

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(NotionError::NotFound(path.to_string()));
        }

        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let (code, message) = match serde_json::from_str::<ErrorBody>(&text) {
                Ok(body) => (body.code, body.message),
                Err(_) => ("unknown".to_string(), text),
            };
            warn!("Notion API error ({} {}): {}", status.as_u16(), code, message);
            return Err(NotionError::ApiError {
                status: status.as_u16(),
                code,
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| NotionError::InvalidResponse(e.to_string()))
    }
}

/// Strip dashes from a Notion ID; the API accepts both forms.
pub fn normalize_id(id: &str) -> String {
    id.trim().replace('-', "")
}

/// Plain-text title of a database object, if it has one.
pub fn database_title(database: &Value) -> Option<String> {
    let parts = database.get("title")?.as_array()?;
    let title: String = parts
        .iter()
        .filter_map(|part| part.get("plain_text").and_then(Value::as_str))
        .collect();
    (!title.is_empty()).then_some(title)
}

fn with_default_emoji(mut icon: Value) -> Value {
    let is_empty_emoji = icon.get("type").and_then(Value::as_str) == Some("emoji")
        && icon
            .get("emoji")
            .and_then(Value::as_str)
            .map_or(true, str::is_empty);
    if is_empty_emoji {
        icon["emoji"] = Value::String(DEFAULT_DATABASE_EMOJI.to_string());
    }
    icon
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Body of a database query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseQuery {
    /// Filter object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,

    /// Sort objects, applied in order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sorts: Option<Vec<Value>>,

    /// Cursor from a previous response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_cursor: Option<String>,

    /// Page size (Notion caps this at 100).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

impl DatabaseQuery {
    /// Pages edited strictly after `since`, most recently edited first.
    pub fn edited_after(since: DateTime<Utc>) -> Self {
        Self {
            filter: Some(json!({
                "timestamp": "last_edited_time",
                "last_edited_time": {
                    "after": since.to_rfc3339_opts(SecondsFormat::Millis, true)
                }
            })),
            sorts: Some(vec![json!({
                "timestamp": "last_edited_time",
                "direction": "descending"
            })]),
            start_cursor: None,
            page_size: None,
        }
    }

    /// Continue from a cursor.
    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.start_cursor = Some(cursor.into());
        self
    }
}

/// One page of list results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse<T> {
    /// Result objects.
    pub results: Vec<T>,

    /// Whether more results are available.
    #[serde(default)]
    pub has_more: bool,

    /// Cursor for the next page.
    #[serde(default)]
    pub next_cursor: Option<String>,
}

/// A page as returned by a database query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// Page ID.
    pub id: String,

    /// Canonical URL.
    #[serde(default)]
    pub url: String,

    /// Creation time.
    pub created_time: DateTime<Utc>,

    /// Last edit time.
    pub last_edited_time: DateTime<Utc>,

    /// User who last edited the page.
    #[serde(default)]
    pub last_edited_by: Option<PartialUser>,

    /// Property values keyed by property name.
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// A user reference; `name` is only present when Notion expands the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialUser {
    /// User ID.
    pub id: String,

    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
}

/// Parameters for a search request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchParams {
    /// Text to match against titles.
    #[serde(default)]
    pub query: String,

    /// Object filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,

    /// Sort object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Value>,

    /// Cursor from a previous response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_cursor: Option<String>,

    /// Page size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

/// Parameters for creating a database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDatabaseParams {
    /// Parent page ID.
    pub parent_id: String,

    /// Title as a rich text array.
    pub title: Value,

    /// Property schema.
    pub properties: Value,

    /// Optional icon object.
    #[serde(default)]
    pub icon: Option<Value>,

    /// Optional cover object.
    #[serde(default)]
    pub cover: Option<Value>,
}

/// Parameters for updating a database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateDatabaseParams {
    /// Database ID.
    pub database_id: String,

    /// New title as a rich text array.
    #[serde(default)]
    pub title: Option<Value>,

    /// New description as a rich text array.
    #[serde(default)]
    pub description: Option<Value>,

    /// Updated property schema.
    #[serde(default)]
    pub properties: Option<Value>,
}
