//! Document server binary
//!
//! Run with: cargo run -p ocr-rag --bin ocr-rag-server

use ocr_rag::{config::RagConfig, config::VectorBackend, server::RagServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ocr_rag=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = RagConfig::load()?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Database: {}", config.storage.db_path.display());
    tracing::info!(
        "  - Admission limit: {}, workers: {}, extraction timeout: {}s",
        config.processing.admission_limit,
        config.processing.workers,
        config.processing.job_timeout_secs
    );
    tracing::info!("  - Embedding model: {} ({} dims)", config.embeddings.model, config.embeddings.dimensions);
    match config.vector_db.backend {
        VectorBackend::Local => tracing::info!("  - Vector store: in-memory"),
        VectorBackend::Qdrant => tracing::info!(
            "  - Vector store: qdrant at {} (collection {})",
            config.vector_db.url,
            config.vector_db.collection
        ),
    }

    let server = RagServer::new(config).await?;

    tracing::info!("  API: http://{}/api", server.address());
    tracing::info!("  Health: http://{}/health", server.address());
    tracing::info!("Press Ctrl+C to stop");

    server.start().await?;

    Ok(())
}
