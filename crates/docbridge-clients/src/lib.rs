//! # Docbridge Clients
//!
//! HTTP clients and configuration shared by the docbridge crates.
//!
//! - **Config**: [`BridgeConfig`] loaded from environment variables
//! - **Notion**: [`NotionClient`] for databases, pages, blocks and search
//! - **Slack**: [`SlackClient`] for identity, channels, posting and history
//! - **Retry**: exponential backoff helpers used as an opt-in policy layer
//!
//! ```rust,no_run
//! use docbridge_clients::{BridgeConfig, NotionClient, SlackClient};
//!
//! async fn connect() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BridgeConfig::from_env()?;
//!     let slack = SlackClient::new(config.slack.clone(), config.timeout())?;
//!     let notion = NotionClient::new(config.notion.clone(), config.timeout())?;
//!
//!     let me = slack.auth_test().await?;
//!     println!("Connected to Slack as {} in {}", me.user, me.team);
//!     notion.retrieve_database(notion.database_id()).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod notion;
pub mod retry;
pub mod slack;

pub use config::{BridgeConfig, ConfigError, NotionSettings, SlackSettings};
pub use notion::{NotionClient, NotionError};
pub use retry::{with_retry, with_retry_if, RetryConfig};
pub use slack::{SlackClient, SlackError};
