//! Notion MCP tools
//!
//! Thin pass-through tools over the Notion REST API. Each tool returns the
//! API response pretty-printed as text; API failures become error results
//! reading `Error <verb>: <message>`.

use crate::server::{parse_args, McpServerResult, Tool, ToolContext};
use crate::types::{ToolDefinition, ToolResult};
use async_trait::async_trait;
use docbridge_clients::notion::{CreateDatabaseParams, SearchParams, UpdateDatabaseParams};
use docbridge_clients::{NotionClient, NotionError};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, error, instrument};

const CATEGORY: &str = "notion";

/// Render a Notion call outcome as a tool result.
fn respond(verb: &str, result: Result<Value, NotionError>) -> ToolResult {
    match result {
        Ok(value) => ToolResult::json(&value),
        Err(e) => {
            error!(error = %e, "Notion call failed while {}", verb);
            ToolResult::error(format!("Error {}: {}", verb, e))
        }
    }
}

/// All Notion tools sharing one client.
pub fn notion_tools(client: Arc<NotionClient>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(ListDatabasesTool::new(client.clone())),
        Arc::new(QueryDatabaseTool::new(client.clone())),
        Arc::new(CreatePageTool::new(client.clone())),
        Arc::new(UpdatePageTool::new(client.clone())),
        Arc::new(CreateDatabaseTool::new(client.clone())),
        Arc::new(UpdateDatabaseTool::new(client.clone())),
        Arc::new(GetPageTool::new(client.clone())),
        Arc::new(GetBlockChildrenTool::new(client.clone())),
        Arc::new(AppendBlockChildrenTool::new(client.clone())),
        Arc::new(UpdateBlockTool::new(client.clone())),
        Arc::new(GetBlockTool::new(client.clone())),
        Arc::new(SearchTool::new(client)),
    ]
}

macro_rules! notion_tool {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        pub struct $name {
            client: Arc<NotionClient>,
        }

        impl $name {
            pub fn new(client: Arc<NotionClient>) -> Self {
                Self { client }
            }
        }
    };
}

// =============================================================================
// Databases
// =============================================================================

notion_tool!(
    /// Lists every database shared with the integration.
    ListDatabasesTool
);

#[async_trait]
impl Tool for ListDatabasesTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "list-databases",
            "List all databases the integration has access to",
        )
        .with_category(CATEGORY)
    }

    #[instrument(skip_all, fields(tool = "list-databases"))]
    async fn execute(&self, _args: Value, _context: &ToolContext) -> McpServerResult<ToolResult> {
        let result = self
            .client
            .list_databases()
            .await
            .map(|response| response.get("results").cloned().unwrap_or(Value::Array(vec![])));
        Ok(respond("listing databases", result))
    }
}

notion_tool!(
    /// Queries a database with optional filter, sorts and pagination.
    QueryDatabaseTool
);

#[derive(Debug, Deserialize)]
struct QueryDatabaseArgs {
    database_id: String,
    #[serde(default)]
    filter: Option<Value>,
    #[serde(default)]
    sorts: Option<Vec<Value>>,
    #[serde(default)]
    start_cursor: Option<String>,
    #[serde(default)]
    page_size: Option<u32>,
}

#[async_trait]
impl Tool for QueryDatabaseTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("query-database", "Query a database")
            .with_category(CATEGORY)
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "database_id": { "type": "string", "description": "ID of the database to query" },
                    "filter": { "description": "Optional filter criteria" },
                    "sorts": { "type": "array", "items": {}, "description": "Optional sort criteria" },
                    "start_cursor": { "type": "string", "description": "Optional cursor for pagination" },
                    "page_size": { "type": "number", "default": 100, "description": "Number of results per page" }
                },
                "required": ["database_id"]
            }))
    }

    #[instrument(skip_all, fields(tool = "query-database"))]
    async fn execute(&self, args: Value, _context: &ToolContext) -> McpServerResult<ToolResult> {
        let args: QueryDatabaseArgs = parse_args(args)?;
        debug!(database_id = %args.database_id, "Querying database");

        let mut body = Map::new();
        if let Some(filter) = args.filter {
            body.insert("filter".into(), filter);
        }
        if let Some(sorts) = args.sorts {
            body.insert("sorts".into(), Value::Array(sorts));
        }
        if let Some(cursor) = args.start_cursor {
            body.insert("start_cursor".into(), Value::String(cursor));
        }
        body.insert("page_size".into(), json!(args.page_size.unwrap_or(100)));

        let result = self
            .client
            .query_database_raw(&args.database_id, Value::Object(body))
            .await;
        Ok(respond("querying database", result))
    }
}

notion_tool!(
    /// Creates a database under a parent page.
    CreateDatabaseTool
);

#[derive(Debug, Deserialize)]
struct CreateDatabaseArgs {
    parent_id: String,
    title: Value,
    properties: Value,
    #[serde(default)]
    icon: Option<Value>,
    #[serde(default)]
    cover: Option<Value>,
}

#[async_trait]
impl Tool for CreateDatabaseTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("create-database", "Create a new database in a page")
            .with_category(CATEGORY)
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "parent_id": { "type": "string", "description": "ID of the parent page" },
                    "title": { "type": "array", "items": {}, "description": "Database title as rich text array" },
                    "properties": { "type": "object", "description": "Database properties schema" },
                    "icon": { "description": "Optional icon for the database" },
                    "cover": { "description": "Optional cover for the database" }
                },
                "required": ["parent_id", "title", "properties"]
            }))
    }

    #[instrument(skip_all, fields(tool = "create-database"))]
    async fn execute(&self, args: Value, _context: &ToolContext) -> McpServerResult<ToolResult> {
        let args: CreateDatabaseArgs = parse_args(args)?;
        let params = CreateDatabaseParams {
            parent_id: args.parent_id,
            title: args.title,
            properties: args.properties,
            icon: args.icon,
            cover: args.cover,
        };
        Ok(respond("creating database", self.client.create_database(params).await))
    }
}

notion_tool!(
    /// Updates a database's title, description or schema.
    UpdateDatabaseTool
);

#[derive(Debug, Deserialize)]
struct UpdateDatabaseArgs {
    database_id: String,
    #[serde(default)]
    title: Option<Value>,
    #[serde(default)]
    description: Option<Value>,
    #[serde(default)]
    properties: Option<Value>,
}

#[async_trait]
impl Tool for UpdateDatabaseTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("update-database", "Update an existing database")
            .with_category(CATEGORY)
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "database_id": { "type": "string", "description": "ID of the database to update" },
                    "title": { "type": "array", "items": {}, "description": "Optional new title as rich text array" },
                    "description": { "type": "array", "items": {}, "description": "Optional new description as rich text array" },
                    "properties": { "type": "object", "description": "Optional updated properties schema" }
                },
                "required": ["database_id"]
            }))
    }

    #[instrument(skip_all, fields(tool = "update-database"))]
    async fn execute(&self, args: Value, _context: &ToolContext) -> McpServerResult<ToolResult> {
        let args: UpdateDatabaseArgs = parse_args(args)?;
        let params = UpdateDatabaseParams {
            database_id: args.database_id,
            title: args.title,
            description: args.description,
            properties: args.properties,
        };
        Ok(respond("updating database", self.client.update_database(params).await))
    }
}

// =============================================================================
// Pages
// =============================================================================

notion_tool!(
    /// Creates a page in a database.
    CreatePageTool
);

#[derive(Debug, Deserialize)]
struct CreatePageArgs {
    parent_id: String,
    properties: Value,
    #[serde(default)]
    children: Option<Value>,
}

#[async_trait]
impl Tool for CreatePageTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("create-page", "Create a new page in a database")
            .with_category(CATEGORY)
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "parent_id": { "type": "string", "description": "ID of the parent database" },
                    "properties": { "type": "object", "description": "Page properties" },
                    "children": { "type": "array", "items": {}, "description": "Optional content blocks" }
                },
                "required": ["parent_id", "properties"]
            }))
    }

    #[instrument(skip_all, fields(tool = "create-page"))]
    async fn execute(&self, args: Value, _context: &ToolContext) -> McpServerResult<ToolResult> {
        let args: CreatePageArgs = parse_args(args)?;
        let result = self
            .client
            .create_page(&args.parent_id, args.properties, args.children)
            .await;
        Ok(respond("creating page", result))
    }
}

notion_tool!(
    /// Updates page properties or archive state.
    UpdatePageTool
);

#[derive(Debug, Deserialize)]
struct UpdatePageArgs {
    page_id: String,
    properties: Value,
    #[serde(default)]
    archived: Option<bool>,
}

#[async_trait]
impl Tool for UpdatePageTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("update-page", "Update an existing page")
            .with_category(CATEGORY)
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "page_id": { "type": "string", "description": "ID of the page to update" },
                    "properties": { "type": "object", "description": "Updated page properties" },
                    "archived": { "type": "boolean", "description": "Whether to archive the page" }
                },
                "required": ["page_id", "properties"]
            }))
    }

    #[instrument(skip_all, fields(tool = "update-page"))]
    async fn execute(&self, args: Value, _context: &ToolContext) -> McpServerResult<ToolResult> {
        let args: UpdatePageArgs = parse_args(args)?;
        let result = self
            .client
            .update_page(&args.page_id, args.properties, args.archived)
            .await;
        Ok(respond("updating page", result))
    }
}

notion_tool!(
    /// Retrieves a page.
    GetPageTool
);

#[derive(Debug, Deserialize)]
struct PageIdArgs {
    page_id: String,
}

#[async_trait]
impl Tool for GetPageTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("get-page", "Retrieve a page by its ID")
            .with_category(CATEGORY)
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "page_id": { "type": "string", "description": "ID of the page to retrieve" }
                },
                "required": ["page_id"]
            }))
    }

    #[instrument(skip_all, fields(tool = "get-page"))]
    async fn execute(&self, args: Value, _context: &ToolContext) -> McpServerResult<ToolResult> {
        let args: PageIdArgs = parse_args(args)?;
        Ok(respond("retrieving page", self.client.retrieve_page(&args.page_id).await))
    }
}

// =============================================================================
// Blocks
// =============================================================================

notion_tool!(
    /// Lists the children of a block or page.
    GetBlockChildrenTool
);

#[derive(Debug, Deserialize)]
struct BlockChildrenArgs {
    block_id: String,
    #[serde(default)]
    start_cursor: Option<String>,
    #[serde(default)]
    page_size: Option<u32>,
}

#[async_trait]
impl Tool for GetBlockChildrenTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("get-block-children", "Retrieve the children blocks of a block")
            .with_category(CATEGORY)
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "block_id": { "type": "string", "description": "ID of the block (page or block)" },
                    "start_cursor": { "type": "string", "description": "Cursor for pagination" },
                    "page_size": { "type": "number", "default": 100, "description": "Number of results per page" }
                },
                "required": ["block_id"]
            }))
    }

    #[instrument(skip_all, fields(tool = "get-block-children"))]
    async fn execute(&self, args: Value, _context: &ToolContext) -> McpServerResult<ToolResult> {
        let args: BlockChildrenArgs = parse_args(args)?;
        let result = self
            .client
            .list_block_children(&args.block_id, args.start_cursor.as_deref(), args.page_size)
            .await;
        Ok(respond("retrieving block children", result))
    }
}

notion_tool!(
    /// Appends blocks under a parent block.
    AppendBlockChildrenTool
);

#[derive(Debug, Deserialize)]
struct AppendBlockChildrenArgs {
    block_id: String,
    children: Value,
    #[serde(default)]
    after: Option<String>,
}

#[async_trait]
impl Tool for AppendBlockChildrenTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("append-block-children", "Append new children blocks to a block")
            .with_category(CATEGORY)
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "block_id": { "type": "string", "description": "ID of the parent block (page or block)" },
                    "children": { "type": "array", "items": {}, "description": "List of block objects to append" },
                    "after": { "type": "string", "description": "Optional ID of an existing block to append after" }
                },
                "required": ["block_id", "children"]
            }))
    }

    #[instrument(skip_all, fields(tool = "append-block-children"))]
    async fn execute(&self, args: Value, _context: &ToolContext) -> McpServerResult<ToolResult> {
        let args: AppendBlockChildrenArgs = parse_args(args)?;
        let result = self
            .client
            .append_block_children(&args.block_id, args.children, args.after.as_deref())
            .await;
        Ok(respond("appending block children", result))
    }
}

notion_tool!(
    /// Replaces a block's content.
    UpdateBlockTool
);

#[derive(Debug, Deserialize)]
struct UpdateBlockArgs {
    block_id: String,
    block_type: String,
    content: Value,
    #[serde(default)]
    archived: Option<bool>,
}

#[async_trait]
impl Tool for UpdateBlockTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("update-block", "Update a block's content")
            .with_category(CATEGORY)
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "block_id": { "type": "string", "description": "ID of the block to update" },
                    "block_type": { "type": "string", "description": "The type of block (paragraph, heading_1, to_do, etc.)" },
                    "content": { "type": "object", "description": "The content for the block based on its type" },
                    "archived": { "type": "boolean", "description": "Whether to archive (true) or restore (false) the block" }
                },
                "required": ["block_id", "block_type", "content"]
            }))
    }

    #[instrument(skip_all, fields(tool = "update-block"))]
    async fn execute(&self, args: Value, _context: &ToolContext) -> McpServerResult<ToolResult> {
        let args: UpdateBlockArgs = parse_args(args)?;
        let result = self
            .client
            .update_block(&args.block_id, &args.block_type, args.content, args.archived)
            .await;
        Ok(respond("updating block", result))
    }
}

notion_tool!(
    /// Retrieves a block.
    GetBlockTool
);

#[derive(Debug, Deserialize)]
struct BlockIdArgs {
    block_id: String,
}

#[async_trait]
impl Tool for GetBlockTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("get-block", "Retrieve a block by its ID")
            .with_category(CATEGORY)
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "block_id": { "type": "string", "description": "ID of the block to retrieve" }
                },
                "required": ["block_id"]
            }))
    }

    #[instrument(skip_all, fields(tool = "get-block"))]
    async fn execute(&self, args: Value, _context: &ToolContext) -> McpServerResult<ToolResult> {
        let args: BlockIdArgs = parse_args(args)?;
        Ok(respond("retrieving block", self.client.retrieve_block(&args.block_id).await))
    }
}

// =============================================================================
// Search
// =============================================================================

notion_tool!(
    /// Full-text search across pages and databases.
    SearchTool
);

#[derive(Debug, Deserialize)]
struct SearchArgs {
    #[serde(default)]
    query: String,
    #[serde(default)]
    filter: Option<Value>,
    #[serde(default)]
    sort: Option<Value>,
    #[serde(default)]
    start_cursor: Option<String>,
    #[serde(default)]
    page_size: Option<u32>,
}

#[async_trait]
impl Tool for SearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("search", "Search pages and databases")
            .with_category(CATEGORY)
            .with_schema(json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "default": "", "description": "Search query string" },
                    "filter": { "description": "Optional filter criteria" },
                    "sort": { "description": "Optional sort criteria" },
                    "start_cursor": { "type": "string", "description": "Cursor for pagination" },
                    "page_size": { "type": "number", "default": 100, "description": "Number of results per page" }
                },
                "required": []
            }))
    }

    #[instrument(skip_all, fields(tool = "search"))]
    async fn execute(&self, args: Value, _context: &ToolContext) -> McpServerResult<ToolResult> {
        let args: SearchArgs = parse_args(args)?;
        let params = SearchParams {
            query: args.query,
            filter: args.filter,
            sort: args.sort,
            start_cursor: args.start_cursor,
            page_size: Some(args.page_size.unwrap_or(100)),
        };
        Ok(respond("searching", self.client.search(&params).await))
    }
}
