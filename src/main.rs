use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use atelier::artist::Registry;
use atelier::config::GalleryConfig;
use atelier::curator::Curator;
use atelier::llm::LlmClient;
use atelier::orb::OrbClient;
use atelier::render::Renderer;
use atelier::store::PieceStore;
use atelier::web::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // JSON logs in production (ATELIER_LOG_JSON=1), human-readable otherwise
    let json_logs = std::env::var("ATELIER_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::from_default_env().add_directive("atelier=info".parse()?);
    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = GalleryConfig::parse();

    // Bad registry or data dir is fatal: refuse to start.
    let registry = Arc::new(Registry::load(&config.artists_path)?);
    tracing::info!(
        artists = registry.len(),
        path = %config.artists_path.display(),
        "loaded artist registry"
    );

    tokio::fs::create_dir_all(config.images_dir())
        .await
        .with_context(|| format!("can't create {}", config.images_dir().display()))?;
    let store = Arc::new(PieceStore::open(&config.pieces_path())?);
    tracing::info!(pieces = store.count(), "piece store loaded");

    let llm = LlmClient::new(
        config.llm_url.clone(),
        Duration::from_secs(config.llm_timeout_secs),
    );
    let renderer = Renderer::new(
        config.sd_bin.clone(),
        config.sd_models_dir.clone(),
        config.sd_steps,
        config.image_size,
        Duration::from_secs(config.sd_timeout_secs),
    );
    let orb = OrbClient::new(&config.orb_url);

    let curator = Arc::new(Curator::new(
        registry.clone(),
        llm,
        renderer,
        orb.clone(),
        store.clone(),
        config.images_dir(),
        Duration::from_secs(config.interval_secs),
        Duration::from_secs(config.startup_delay_secs),
    ));

    let state = Arc::new(AppState {
        store,
        registry,
        orb,
        stage: curator.stage_handle(),
        images_dir: config.images_dir(),
    });

    // The curator owns the write path for the lifetime of the process.
    tokio::spawn(curator.run());

    let app = web::router(state);
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("can't bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "gallery serving");
    axum::serve(listener, app).await?;

    Ok(())
}
