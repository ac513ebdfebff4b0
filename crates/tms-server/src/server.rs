//! Serving the API until a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::error::StartupError;
use crate::routes::router;
use crate::state::AppState;

/// Bind, serve and shut down gracefully on Ctrl+C or SIGTERM.
pub async fn serve(config: &ServerConfig, state: Arc<AppState>) -> Result<(), StartupError> {
    if config.token_cleanup_interval_secs > 0 {
        spawn_token_cleanup(
            Arc::clone(&state),
            Duration::from_secs(config.token_cleanup_interval_secs),
        );
    }

    let address = config.socket_addr();
    let listener = TcpListener::bind(&address).await?;
    info!(%address, "Server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Purge expired tokens periodically.
fn spawn_token_cleanup(state: Arc<AppState>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            if let Err(e) = state.auth.cleanup_expired().await {
                warn!(error = %e, "Expired token cleanup failed");
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
