use axum::http::{Method, header};
use comdb_server::{AppState, ServerConfig, api};
use comdb_storage::Storage;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;

const COMPACTION_INTERVAL: Duration = Duration::from_secs(300);
const COMPACTION_MIN_LOG_BYTES: u64 = 1024 * 1024;

/// Periodic maintenance: rewrite the kv log once at least half of it is
/// reclaimable, so churn-heavy workloads cannot grow it without bound.
async fn compaction_loop(storage: Arc<Storage>) {
    let mut ticker = tokio::time::interval(COMPACTION_INTERVAL);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let stats = storage.bitcask.stats();
        if stats.log_size_bytes >= COMPACTION_MIN_LOG_BYTES
            && stats.reclaimable_bytes * 2 >= stats.log_size_bytes
        {
            if let Err(e) = storage.bitcask.compact() {
                tracing::error!(error = %e, "background compaction failed");
            }
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing logger
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,comdb_server=debug".into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    tracing::info!("Starting ComDB server");

    let config = ServerConfig::load().expect("Failed to load server config");
    let storage = Arc::new(
        Storage::open(&config.data_dir)
            .unwrap_or_else(|e| panic!("Failed to open data dir {:?}: {e}", config.data_dir)),
    );
    tracing::info!(data_dir = %config.data_dir.display(), "storage opened");

    tokio::spawn(compaction_loop(storage.clone()));

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    let app = api::router(AppState::new(storage)).layer(cors);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {addr}: {e}"));

    tracing::info!("ComDB running on http://{addr}");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
