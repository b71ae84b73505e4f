use anyhow::Result;
use clap::Parser;
use facebook_scraper_mcp::{
    config::{Config, ResultMode, Transport},
    server::run_server,
    stdio::run_stdio,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser)]
#[command(name = "facebook-scraper-mcp")]
#[command(about = "MCP server for scraping Facebook posts and comments through Apify")]
struct Args {
    /// Transport to serve: sse or stdio
    #[arg(long, default_value = "sse")]
    transport: Transport,

    /// Server host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(long, default_value = "4000")]
    port: u16,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Directory for daily rolling log files
    #[arg(long, default_value = ".facebook-scraper-mcp/logs")]
    log_dir: String,

    /// Apify API token
    #[arg(long, env = "APIFY_TOKEN", hide_env_values = true)]
    apify_token: Option<String>,

    /// Apify API base URL
    #[arg(long, default_value = "https://api.apify.com")]
    apify_base_url: String,

    /// Seconds each wait-for-finish request may block on the Apify side
    #[arg(long, default_value = "60")]
    actor_wait_secs: u64,

    /// Idle seconds before an SSE heartbeat is sent
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..))]
    heartbeat_secs: u64,

    /// Comma-separated host substrings accepted in the Origin header
    #[arg(long, default_value = "localhost,127.0.0.1")]
    allowed_origins: String,

    /// Tool result shape: summary or full
    #[arg(long, default_value = "summary")]
    result_mode: ResultMode,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Console and file logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let logs_dir = std::path::Path::new(&args.log_dir);
    std::fs::create_dir_all(logs_dir)?;

    let file_appender = tracing_appender::rolling::daily(logs_dir, "server.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // stdout belongs to the protocol in stdio mode
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(env_filter.clone()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(env_filter),
        )
        .init();

    info!("Starting Facebook Scraper MCP Server");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Transport: {}", args.transport);
    info!("Result mode: {}", args.result_mode);
    if args.apify_token.as_deref().map_or(true, str::is_empty) {
        info!("APIFY_TOKEN is not set; tool calls will fail until it is configured");
    }

    let config = Config {
        transport: args.transport,
        host: args.host,
        port: args.port,
        apify_token: args.apify_token,
        apify_base_url: args.apify_base_url,
        actor_wait_secs: args.actor_wait_secs,
        heartbeat_secs: args.heartbeat_secs,
        allowed_origins: args
            .allowed_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        result_mode: args.result_mode,
    };

    match config.transport {
        Transport::Sse => run_server(config).await?,
        Transport::Stdio => run_stdio(config).await?,
    }

    Ok(())
}
