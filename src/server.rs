use axum::{
    extract::State,
    http::{request::Parts, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use std::{any::Any, sync::Arc};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

use crate::{
    apify::{ActorRunner, ApifyClient},
    config::Config,
    error::Result,
    mcp::{
        constants::{SERVER_DISPLAY_NAME, SERVER_NAME, SERVER_VERSION},
        server::McpServer,
        MCP_PROTOCOL_VERSION,
    },
    session::SessionRegistry,
    sse::{message_handler, sse_handler},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sessions: SessionRegistry,
    pub mcp_server: Arc<McpServer>,
}

impl AppState {
    pub fn new(config: Config, actor: Arc<dyn ActorRunner>) -> Self {
        let mcp_server = Arc::new(McpServer::new(&config, actor));
        Self {
            config,
            sessions: SessionRegistry::new(),
            mcp_server,
        }
    }
}

/// Build the HTTP router for the SSE transport
pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
            axum::http::header::CACHE_CONTROL,
            axum::http::header::HeaderName::from_static("last-event-id"),
        ])
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| {
                origin
                    .to_str()
                    .map(|origin| config.origin_allowed(origin))
                    .unwrap_or(false)
            },
        ));

    Router::new()
        .route("/", get(server_info))
        .route("/health", get(health_check))
        .route("/sse", get(sse_handler))
        .route("/messages", post(message_handler))
        .layer(RequestBodyLimitLayer::new(1024 * 1024)) // 1 MiB
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn run_server(config: Config) -> Result<()> {
    let actor = ApifyClient::new(&config)
        .map_err(|e| anyhow::anyhow!("Failed to create Apify client: {}", e))?;

    let state = AppState::new(config.clone(), Arc::new(actor));
    let sessions = state.sessions.clone();
    let app = create_app(state);

    let address = config.server_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!("Server listening on {}", address);
    info!("SSE endpoint: http://{}/sse", address);
    info!("Messages endpoint: http://{}/messages", address);

    match axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(sessions))
        .await
    {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => error!("Server error: {}", e),
    }

    Ok(())
}

/// Resolve on Ctrl-C after ending every live stream, so open SSE responses
/// do not hold the shutdown open.
async fn shutdown_signal(sessions: SessionRegistry) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }

    info!("Shutdown requested");
    sessions.close_all();
}

/// A panicking handler answers its caller with 500 instead of dropping the
/// connection.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = err.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = err.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unknown panic".to_string()
    };
    error!("Request handler panicked: {}", detail);

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
        .into_response()
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "transport": "sse",
        "connected_clients": state.sessions.len(),
        "server_info": {
            "name": SERVER_NAME,
            "version": SERVER_VERSION
        },
        "tools": state.mcp_server.tools.names()
    }))
}

async fn server_info(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": SERVER_DISPLAY_NAME,
        "transport": "sse",
        "version": SERVER_VERSION,
        "protocol": format!("MCP {}", MCP_PROTOCOL_VERSION),
        "endpoints": {
            "sse": "/sse",
            "messages": "/messages",
            "health": "/health"
        },
        "tools": state.mcp_server.tools.names(),
        "connected_clients": state.sessions.len()
    }))
}
