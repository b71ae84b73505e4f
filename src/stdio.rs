//! Newline-delimited JSON-RPC over stdin/stdout.
//!
//! Each input line is one message and each response is written as one line.
//! Notifications produce no output. Logs must stay on stderr.

use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::{
    apify::ApifyClient,
    config::Config,
    error::Result,
    mcp::{
        server::McpServer,
        types::{JsonRpcRequest, INTERNAL_ERROR, INVALID_REQUEST, PARSE_ERROR},
        JsonRpcEnvelopes,
    },
};

pub async fn run_stdio(config: Config) -> Result<()> {
    let actor = ApifyClient::new(&config)
        .map_err(|e| anyhow::anyhow!("Failed to create Apify client: {}", e))?;
    let server = McpServer::new(&config, Arc::new(actor));

    info!("Serving MCP over stdio");
    serve_lines(
        &server,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await?;
    info!("stdin closed, shutting down");

    Ok(())
}

/// Answer every line read from `reader` on `writer` until EOF.
pub async fn serve_lines<R, W>(server: &McpServer, reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let Some(reply) = handle_line(server, line).await else {
            continue;
        };

        writer.write_all(reply.to_string().as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    Ok(())
}

async fn handle_line(server: &McpServer, line: &str) -> Option<Value> {
    let payload: Value = match serde_json::from_str(line) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Unparseable stdio message: {}", e);
            return Some(JsonRpcEnvelopes::error_response(
                PARSE_ERROR,
                &format!("Parse error: {}", e),
                None,
            ));
        }
    };

    let request: JsonRpcRequest = match serde_json::from_value(payload.clone()) {
        Ok(request) => request,
        Err(e) => {
            return Some(JsonRpcEnvelopes::error_response(
                INVALID_REQUEST,
                &format!("Invalid request: {}", e),
                payload.get("id").cloned(),
            ))
        }
    };

    debug!("stdio request: {}", request.method);
    let response = server.handle_request(request).await?;

    match serde_json::to_value(&response) {
        Ok(value) => Some(value),
        Err(e) => Some(JsonRpcEnvelopes::error_response(
            INTERNAL_ERROR,
            &format!("Internal error: {}", e),
            response.id,
        )),
    }
}
