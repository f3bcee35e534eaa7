//! HTTP-level tests for the Notion and Slack clients.
//!
//! Each test stands up wiremock servers in place of the real APIs and checks
//! the request shape (auth headers, paths, bodies) and the error mapping.

use docbridge_clients::config::{NotionSettings, SlackSettings, DEFAULT_NOTION_VERSION};
use docbridge_clients::notion::{CreateDatabaseParams, DatabaseQuery};
use docbridge_clients::{NotionClient, NotionError, SlackClient, SlackError};
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Test fixture providing mock servers for both platforms.
struct TestFixture {
    notion_server: MockServer,
    slack_server: MockServer,
}

impl TestFixture {
    async fn new() -> Self {
        Self {
            notion_server: MockServer::start().await,
            slack_server: MockServer::start().await,
        }
    }

    fn notion_client(&self) -> NotionClient {
        let settings = NotionSettings {
            api_url: self.notion_server.uri(),
            api_key: "secret_test".to_string(),
            database_id: "db-1".to_string(),
            notion_version: DEFAULT_NOTION_VERSION.to_string(),
        };
        NotionClient::new(settings, Duration::from_secs(5)).expect("client")
    }

    fn slack_client(&self) -> SlackClient {
        let settings = SlackSettings {
            api_url: self.slack_server.uri(),
            bot_token: "xoxb-test".to_string(),
            app_token: "xapp-test".to_string(),
            channels: None,
        };
        SlackClient::new(settings, Duration::from_secs(5)).expect("client")
    }
}

// =============================================================================
// Notion
// =============================================================================

#[tokio::test]
async fn test_query_database_sends_filter_and_headers() {
    let fixture = TestFixture::new().await;

    Mock::given(method("POST"))
        .and(path("/databases/db1/query"))
        .and(header("Authorization", "Bearer secret_test"))
        .and(header("Notion-Version", DEFAULT_NOTION_VERSION))
        .and(body_partial_json(serde_json::json!({
            "filter": {
                "timestamp": "last_edited_time",
                "last_edited_time": { "after": "2024-01-01T00:00:00.000Z" }
            },
            "sorts": [{ "timestamp": "last_edited_time", "direction": "descending" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "object": "list",
            "results": [{
                "object": "page",
                "id": "p1",
                "url": "https://www.notion.so/p1",
                "created_time": "2024-01-01T00:00:05.000Z",
                "last_edited_time": "2024-01-01T00:00:09.000Z",
                "last_edited_by": { "object": "user", "id": "u1", "name": "Ada" },
                "properties": {}
            }],
            "has_more": false,
            "next_cursor": null
        })))
        .expect(1)
        .mount(&fixture.notion_server)
        .await;

    let since = "2024-01-01T00:00:00Z".parse().unwrap();
    let response = fixture
        .notion_client()
        .query_database("db-1", &DatabaseQuery::edited_after(since))
        .await
        .expect("query should succeed");

    assert_eq!(response.results.len(), 1);
    assert_eq!(response.results[0].id, "p1");
    assert!(!response.has_more);
}

#[tokio::test]
async fn test_notion_error_body_is_parsed() {
    let fixture = TestFixture::new().await;

    Mock::given(method("POST"))
        .and(path("/databases/db1/query"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "object": "error",
            "status": 400,
            "code": "validation_error",
            "message": "body failed validation"
        })))
        .mount(&fixture.notion_server)
        .await;

    let err = fixture
        .notion_client()
        .query_database_raw("db-1", serde_json::json!({}))
        .await
        .unwrap_err();

    match err {
        NotionError::ApiError {
            status,
            code,
            message,
        } => {
            assert_eq!(status, 400);
            assert_eq!(code, "validation_error");
            assert_eq!(message, "body failed validation");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_notion_unauthorized_and_not_found() {
    let fixture = TestFixture::new().await;

    Mock::given(method("GET"))
        .and(path("/databases/locked"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&fixture.notion_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pages/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&fixture.notion_server)
        .await;

    let client = fixture.notion_client();
    assert!(matches!(
        client.retrieve_database("locked").await,
        Err(NotionError::AuthenticationFailed)
    ));
    assert!(matches!(
        client.retrieve_page("missing").await,
        Err(NotionError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_create_database_strips_dashes_and_defaults_icon() {
    let fixture = TestFixture::new().await;

    Mock::given(method("POST"))
        .and(path("/databases"))
        .and(body_partial_json(serde_json::json!({
            "parent": { "type": "page_id", "page_id": "abc123" },
            "icon": { "type": "emoji", "emoji": "📄" }
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "object": "database", "id": "new-db" })),
        )
        .expect(1)
        .mount(&fixture.notion_server)
        .await;

    let created = fixture
        .notion_client()
        .create_database(CreateDatabaseParams {
            parent_id: "abc-123".to_string(),
            title: serde_json::json!([{ "text": { "content": "Docs" } }]),
            properties: serde_json::json!({ "Name": { "title": {} } }),
            icon: Some(serde_json::json!({ "type": "emoji", "emoji": "" })),
            cover: None,
        })
        .await
        .expect("create should succeed");

    assert_eq!(created["id"], "new-db");
}

#[tokio::test]
async fn test_list_block_children_passes_cursor() {
    let fixture = TestFixture::new().await;

    Mock::given(method("GET"))
        .and(path("/blocks/blk1/children"))
        .and(query_param("page_size", "50"))
        .and(query_param("start_cursor", "cur-2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "results": [], "has_more": false })),
        )
        .expect(1)
        .mount(&fixture.notion_server)
        .await;

    fixture
        .notion_client()
        .list_block_children("blk-1", Some("cur-2"), Some(50))
        .await
        .expect("list should succeed");
}

// =============================================================================
// Slack
// =============================================================================

#[tokio::test]
async fn test_auth_test_identity() {
    let fixture = TestFixture::new().await;

    Mock::given(method("POST"))
        .and(path("/auth.test"))
        .and(header("Authorization", "Bearer xoxb-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "user": "docbot",
            "team": "Acme",
            "user_id": "U1",
            "team_id": "T1"
        })))
        .expect(1)
        .mount(&fixture.slack_server)
        .await;

    let me = fixture.slack_client().auth_test().await.expect("auth ok");
    assert_eq!(me.user, "docbot");
    assert_eq!(me.team, "Acme");
}

#[tokio::test]
async fn test_ok_false_is_an_api_error() {
    let fixture = TestFixture::new().await;

    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "ok": false, "error": "channel_not_found" })),
        )
        .mount(&fixture.slack_server)
        .await;

    let err = fixture
        .slack_client()
        .post_message("C404", "hello", None)
        .await
        .unwrap_err();

    match err {
        SlackError::Api { method, error } => {
            assert_eq!(method, "chat.postMessage");
            assert_eq!(error, "channel_not_found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_rate_limit_is_an_http_error() {
    let fixture = TestFixture::new().await;

    Mock::given(method("GET"))
        .and(path("/conversations.history"))
        .respond_with(ResponseTemplate::new(429).set_body_string("ratelimited"))
        .mount(&fixture.slack_server)
        .await;

    let err = fixture.slack_client().history("C1", 10).await.unwrap_err();
    assert!(matches!(err, SlackError::Http { status: 429, .. }));
}

#[tokio::test]
async fn test_post_message_threaded() {
    let fixture = TestFixture::new().await;

    Mock::given(method("POST"))
        .and(path("/chat.postMessage"))
        .and(body_partial_json(serde_json::json!({
            "channel": "C1",
            "text": "reply",
            "thread_ts": "1700000000.000100"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "channel": "C1",
            "ts": "1700000001.000200"
        })))
        .expect(1)
        .mount(&fixture.slack_server)
        .await;

    let posted = fixture
        .slack_client()
        .post_message("C1", "reply", Some("1700000000.000100"))
        .await
        .expect("post ok");
    assert_eq!(posted.ts, "1700000001.000200");
}

#[tokio::test]
async fn test_list_channels_follows_cursor() {
    let fixture = TestFixture::new().await;

    Mock::given(method("GET"))
        .and(path("/conversations.list"))
        .and(query_param("cursor", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "channels": [{ "id": "C2", "name": "random" }],
            "response_metadata": { "next_cursor": "" }
        })))
        .expect(1)
        .mount(&fixture.slack_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/conversations.list"))
        .and(query_param("types", "public_channel"))
        .and(query_param("exclude_archived", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "channels": [{ "id": "C1", "name": "general" }],
            "response_metadata": { "next_cursor": "page2" }
        })))
        .up_to_n_times(1)
        .mount(&fixture.slack_server)
        .await;

    let channels = fixture
        .slack_client()
        .list_public_channels()
        .await
        .expect("list ok");

    let names: Vec<_> = channels.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["general", "random"]);
}
