//! Newline-delimited JSON-RPC transport.
//!
//! One request per line in, one response per line out. Stdout carries nothing
//! but protocol frames; logs go to stderr.

use crate::server::McpServer;
use crate::types::{McpError, McpRequest, McpResponse, RequestId};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Transport failures. Malformed input is answered, not raised.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Serve requests from `reader` until EOF or cancellation.
pub async fn serve<R, W>(
    server: &McpServer,
    reader: R,
    mut writer: W,
    cancel: CancellationToken,
) -> Result<(), TransportError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => {
                info!("Transport cancelled");
                break;
            }
            line = lines.next_line() => line?,
        };

        let Some(line) = line else {
            info!("Client closed the connection");
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(response) = dispatch(server, line).await {
            let mut frame = serde_json::to_vec(&response)?;
            frame.push(b'\n');
            writer.write_all(&frame).await?;
            writer.flush().await?;
        }
    }

    Ok(())
}

/// Serve over the process's stdin and stdout.
pub async fn serve_stdio(
    server: &McpServer,
    cancel: CancellationToken,
) -> Result<(), TransportError> {
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    serve(server, stdin, stdout, cancel).await
}

async fn dispatch(server: &McpServer, line: &str) -> Option<McpResponse> {
    let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "Unparsable frame");
            return Some(McpResponse::error(RequestId::Null, McpError::parse_error()));
        }
    };

    match serde_json::from_value::<McpRequest>(value.clone()) {
        Ok(request) => {
            debug!(method = %request.method, "Request received");
            server.handle_request(request).await
        }
        Err(e) => {
            warn!(error = %e, "Invalid JSON-RPC request");
            let id = value
                .get("id")
                .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok())
                .unwrap_or_default();
            Some(McpResponse::error(id, McpError::invalid_request()))
        }
    }
}
