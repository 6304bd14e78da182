//! slides2text server binary.

use anyhow::Context;
use clap::Parser;
use slides2text::config::AppConfig;
use slides2text::server::{router, AppState};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Slide deck to per-slide summaries, over HTTP.
#[derive(Parser, Debug)]
#[command(name = "slides2text", version, about, long_about = None)]
struct Cli {
    /// Address to bind the server to.
    #[arg(long, env = "SLIDES2TEXT_HOST")]
    host: Option<String>,

    /// Port to listen on.
    #[arg(long, env = "SLIDES2TEXT_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("slides2text=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env().context("invalid configuration")?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    let addr = format!("{}:{}", config.host, config.port);
    info!(
        %addr,
        dpi = config.dpi,
        openai_key = config.openai_api_key.is_some(),
        gemini_key = config.gemini_api_key.is_some(),
        "starting slides2text server"
    );

    let app = router(AppState::production(config));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .await
        .context("server terminated")?;

    Ok(())
}
