use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use siteaudit_analyzer::{ScanManager, WorkerConfig};
use siteaudit_api::config::ServerConfig;
use siteaudit_api::router::build_app_router;
use siteaudit_api::state::AppState;
use siteaudit_api::ws;
use siteaudit_core::store::JobStore;
use siteaudit_db::{MemoryJobStore, PgJobStore};
use siteaudit_events::ScanBroadcaster;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "siteaudit_api=debug,siteaudit_analyzer=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    let worker_config = WorkerConfig::from_env();
    tracing::info!(program = %worker_config.program, "Analyzer command configured");

    // --- Job store ---
    let store: Arc<dyn JobStore> = match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = siteaudit_db::create_pool(&database_url)
                .await
                .expect("Failed to connect to database");
            siteaudit_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Using PostgreSQL job store");
            Arc::new(PgJobStore::new(pool))
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set, using in-memory job store");
            Arc::new(MemoryJobStore::new())
        }
    };

    // --- WebSocket manager + heartbeat ---
    let ws_manager = Arc::new(ws::WsManager::new());
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager));

    // --- Event broadcaster ---
    let broadcaster = Arc::new(ScanBroadcaster::new());

    // --- Scan manager ---
    let scan_manager = ScanManager::new(
        Arc::clone(&store),
        Arc::clone(&broadcaster),
        worker_config,
    );
    tracing::info!("Scan manager started");

    // --- App state ---
    let state = AppState {
        store,
        config: Arc::new(config.clone()),
        ws_manager: Arc::clone(&ws_manager),
        broadcaster,
        scan_manager: Arc::clone(&scan_manager),
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Kill in-flight analyzers first; their jobs land in `failed` with
    // logs intact via the normal exit path.
    scan_manager.shutdown().await;

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    heartbeat_handle.abort();
    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
