use metrics_exporter_prometheus::PrometheusBuilder;
use missing_person_service::{
    config::AppConfig,
    db,
    routes::metrics::describe_metrics,
    services::{image_processor::R2ProcessorProvider, photo_store::PhotoStore},
    shutdown,
    worker::{Dispatcher, JobPipeline, PgJobStore},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting photo worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");
    let settings = config.worker_settings();

    if let Some(addr) = &config.worker_metrics_addr {
        let addr: SocketAddr = addr.parse().expect("Invalid WORKER_METRICS_ADDR");
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .expect("Failed to install Prometheus exporter");
        describe_metrics();
        tracing::info!(%addr, "Serving worker metrics");
    }

    // Initialize database
    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    let store = Arc::new(PgJobStore::new(db_pool));
    let processors = Arc::new(R2ProcessorProvider::new(config.storage_settings()));
    let photos = PhotoStore::new(&config.upload_dir);

    let pipeline = JobPipeline::new(store.clone(), processors, photos, &settings);
    let dispatcher = Dispatcher::new(store, pipeline, &settings);

    let shutdown = shutdown::install_shutdown_handler().expect("Failed to install signal handlers");
    dispatcher.run(shutdown).await;

    tracing::info!("Photo worker exited");
}
