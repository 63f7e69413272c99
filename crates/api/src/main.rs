use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cadence_api::config::ServerConfig;
use cadence_api::router::build_app_router;
use cadence_api::state::AppState;
use cadence_store::{EventStore, Persister};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cadence_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Engine state ---
    let store = Arc::new(EventStore::in_memory());
    let state = AppState::new(Arc::clone(&store), config.clone());

    // --- Snapshot persistence ---
    let persister = Arc::new(Persister::new(
        Arc::clone(&store),
        Arc::clone(&state.approvals),
        Arc::clone(&state.change_requests),
        &config.snapshot_path,
    ));
    let restored = persister
        .restore()
        .await
        .expect("Failed to restore state snapshot");
    if restored {
        tracing::info!(path = %config.snapshot_path.display(), "State restored");
    } else {
        tracing::info!("No snapshot found, starting empty");
    }

    let flush_cancel = CancellationToken::new();
    let flush_handle = tokio::spawn(Arc::clone(&persister).run(
        Duration::from_secs(config.snapshot_interval_secs),
        flush_cancel.clone(),
    ));

    // --- Router ---
    let app = build_app_router(state, &config)
        .into_make_service_with_connect_info::<SocketAddr>();

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

    // Stop the flush loop; it writes one final snapshot on cancel.
    flush_cancel.cancel();
    let _ = tokio::time::timeout(
        Duration::from_secs(config.shutdown_timeout_secs),
        flush_handle,
    )
    .await;
    tracing::info!("Final snapshot written, graceful shutdown complete");
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
