use anyhow::Context;
use std::sync::Arc;
use textbook::app::{AppState, build_router};
use textbook::config::Config;
use textbook::services::backend::BackendClient;
use textbook::services::registry;
use tokio::net::TcpListener;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Config::from_env();
    let broken = registry::validate_links();
    anyhow::ensure!(broken.is_empty(), "broken chapter links: {}", broken.join(", "));

    let backend = Arc::new(BackendClient::new(&config)?);
    tracing::info!(api_url = backend.api_url(), "using answer backend");

    let app = build_router(AppState { backend });

    let listener = TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
