use docbridge_clients::{BridgeConfig, NotionClient, RetryConfig, SlackClient};
use docbridge_mcp::{all_tools, serve_stdio, HealthChecker, McpServer};
use docbridge_watch::{
    spawn_poller, BridgeError, ChangeDetector, ChangeSource, ChannelDirectory,
    NotionChangeSource, RetryingSource, SlackNotifier,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // stdout is the protocol channel; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, fatal = e.is_fatal(), "docbridge stopped");
            1
        }
    };

    // A pending blocking stdin read would otherwise hold the runtime open.
    std::process::exit(code);
}

async fn run() -> Result<(), BridgeError> {
    let config = BridgeConfig::from_env()?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        channel = %config.updates_channel,
        interval_secs = config.poll_interval_secs,
        "Starting docbridge"
    );

    let slack = SlackClient::new(config.slack.clone(), config.timeout()).map_err(|e| {
        BridgeError::ConfigInvalid {
            message: format!("cannot build Slack client: {}", e),
        }
    })?;
    let notion = NotionClient::new(config.notion.clone(), config.timeout()).map_err(|e| {
        BridgeError::ConfigInvalid {
            message: format!("cannot build Notion client: {}", e),
        }
    })?;

    let health = Arc::new(HealthChecker::new(slack.clone(), notion.clone()));
    health.ensure_ready().await?;

    let directory = ChannelDirectory::load(&slack)
        .await
        .map_err(|e| BridgeError::auth("slack", e))?;
    let notifier = Arc::new(SlackNotifier::new(slack, directory));

    let base = NotionChangeSource::new(notion.clone()).with_max_pages(config.query_max_pages);
    let source: Arc<dyn ChangeSource> = if config.query_retries > 1 {
        Arc::new(RetryingSource::new(
            base,
            RetryConfig::with_attempts(config.query_retries),
        ))
    } else {
        Arc::new(base)
    };

    let cancel = CancellationToken::new();
    let detector = ChangeDetector::new(
        source,
        notifier.clone(),
        config.notion.database_id.clone(),
        config.updates_channel.clone(),
    );
    let poller = spawn_poller(detector, config.poll_interval(), cancel.child_token());

    let server = McpServer::docbridge();
    server
        .register_tools(all_tools(Arc::new(notion), notifier, health))
        .await;
    info!(tools = server.list_tools().await.len(), "MCP server ready on stdio");

    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received");
            signal_token.cancel();
        }
    });

    let served = serve_stdio(&server, cancel.clone()).await;

    cancel.cancel();
    if let Err(e) = poller.shutdown().await {
        error!(error = %e, "Change poller task failed");
    }
    info!("docbridge stopped");

    if let Err(e) = served {
        error!(error = %e, "Transport failed");
    }
    Ok(())
}
