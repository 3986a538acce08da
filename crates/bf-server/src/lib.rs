//! bf-server: HTTP front end for the audiobook pipeline.
//!
//! - Axum router with `POST /api/convert`, `GET /api/health`, `GET /api/tools`
//! - Multipart uploads staged into scoped directories
//! - Streamed responses that clean up after themselves
//! - Graceful shutdown via signal handling

pub mod context;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use bf_av::{FfmpegEngine, ToolRegistry};
use bf_core::config::Config;

use crate::context::AppContext;

/// Start the bookforge server.
///
/// Discovers ffmpeg/ffprobe, builds the [`AppContext`], and serves until a
/// shutdown signal is received.
pub async fn start(config: Config) -> bf_core::Result<()> {
    for warning in config.validate() {
        tracing::warn!("Config warning: {warning}");
    }

    // Discovery and `-version` checks block on subprocesses.
    let tool_config = config.tools.clone();
    let (tools, infos) = tokio::task::spawn_blocking(move || {
        let tools = ToolRegistry::discover(&tool_config);
        let infos = tools.check_all();
        (tools, infos)
    })
    .await
    .map_err(|e| bf_core::Error::Internal(format!("tool discovery failed: {e}")))?;

    for info in infos {
        if info.available {
            tracing::info!(
                "Tool found: {} ({})",
                info.name,
                info.version.as_deref().unwrap_or("unknown version")
            );
        } else {
            tracing::warn!("Tool not found: {}", info.name);
        }
    }

    let engine = Arc::new(FfmpegEngine::from_registry(&tools, &config.encode)?);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| bf_core::Error::Internal(format!("Invalid server address: {e}")))?;

    let ctx = AppContext::new(config, tools, engine);
    let app = router::build_router(ctx);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| bf_core::Error::Internal(format!("Failed to bind to {addr}: {e}")))?;
    tracing::info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
