use std::sync::Arc;

use insight_lens::config::Config;
use insight_lens::http;
use insight_lens::insights::{InsightRequester, create_completion_client};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    insight_lens::load_env();

    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("LENS_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.runtime.log_level)),
        )
        .with_ansi(false)
        .init();

    tracing::info!(
        "Starting insight-lens v{} on {}",
        env!("CARGO_PKG_VERSION"),
        config.server.http_bind
    );

    let client = create_completion_client(&config)?;
    if client.is_none() {
        tracing::warn!("No API key configured; analysis requests will return a fixed notice");
    }
    let requester = Arc::new(InsightRequester::from_config(&config, client));

    http::start_http_server(Arc::new(config), requester).await?;
    Ok(())
}
