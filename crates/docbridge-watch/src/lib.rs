//! # Docbridge Watch
//!
//! Watches a Notion database and announces every new or edited page in a
//! Slack channel.
//!
//! ## Overview
//!
//! - **Directory**: [`ChannelDirectory`] maps channel names to IDs
//! - **Notifier**: [`SlackNotifier`] posts messages and searches history
//! - **Query**: [`NotionChangeSource`] asks for pages edited after a watermark
//! - **Poller**: [`ChangeDetector`] runs the poll, classify and notify cycle
//!
//! ## Usage
//!
//! ```rust,no_run
//! use docbridge_clients::{BridgeConfig, NotionClient, SlackClient};
//! use docbridge_watch::{spawn_poller, ChangeDetector, ChannelDirectory};
//! use docbridge_watch::{NotionChangeSource, SlackNotifier};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! async fn watch(config: BridgeConfig) -> Result<(), Box<dyn std::error::Error>> {
//!     let slack = SlackClient::new(config.slack.clone(), config.timeout())?;
//!     let notion = NotionClient::new(config.notion.clone(), config.timeout())?;
//!
//!     let directory = ChannelDirectory::load(&slack).await?;
//!     let notifier = Arc::new(SlackNotifier::new(slack, directory));
//!     let source = Arc::new(NotionChangeSource::new(notion));
//!
//!     let detector = ChangeDetector::new(
//!         source,
//!         notifier,
//!         config.notion.database_id.clone(),
//!         config.updates_channel.clone(),
//!     );
//!     let poller = spawn_poller(detector, config.poll_interval(), CancellationToken::new());
//!
//!     tokio::signal::ctrl_c().await?;
//!     poller.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod directory;
pub mod error;
pub mod notifier;
pub mod poller;
pub mod query;
pub mod record;

pub use directory::ChannelDirectory;
pub use error::{BridgeError, BridgeResult};
pub use notifier::{Delivery, FoundMessage, Notifier, SlackNotifier, SEARCH_WINDOW};
pub use poller::{spawn_poller, ChangeDetector, CycleReport, PollerHandle};
pub use query::{ChangeSource, NotionChangeSource, PropertyNames, RetryingSource};
pub use record::{ChangeKind, ChangeRecord, NotificationMessage};
