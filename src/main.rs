use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ffa_serve::config::Config;
use ffa_serve::dehaze::Dehazer;
use ffa_serve::pipeline::FramePipeline;
use ffa_serve::{AppState, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ffa_serve=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = Config::from_env().context("invalid configuration")?;

    // Weights load once; a bad checkpoint stops startup here
    let checkpoint = config.checkpoint_path.clone();
    let device = config.device;
    let dehazer = tokio::task::spawn_blocking(move || Dehazer::load(&checkpoint, device))
        .await?
        .with_context(|| {
            format!(
                "failed to load model from {}",
                config.checkpoint_path.display()
            )
        })?;
    tracing::info!(device = ?dehazer.device(), "model ready");

    let pipeline = FramePipeline::new(Arc::new(dehazer), config.encoder.clone());
    let state = Arc::new(AppState::new(pipeline));
    let app = routes::app(state, config.max_upload_size);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;

    tracing::info!("Listening on http://{}", addr);
    axum::serve(listener, app).await.context("server failed")?;
    Ok(())
}
