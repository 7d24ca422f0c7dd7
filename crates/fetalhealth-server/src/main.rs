//! Fetal Health Server
//!
//! Serves fetal health class predictions for cardiotocography exams.

use anyhow::Result;
use clap::Parser;
use fetalhealth_server::telemetry::{init_tracing, install_metrics};
use fetalhealth_server::{create_router, AppState, Cli, ServiceConfig};
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = ServiceConfig::load(&cli.config, &cli)?;
    info!(
        model = %config.model_path.display(),
        preload = config.preload_model,
        "Starting fetal health inference service"
    );

    let metrics_handle = install_metrics()?;

    let addr = config.socket_addr()?;
    let preload = config.preload_model;
    let state = AppState::new(config, Some(metrics_handle));

    if preload {
        state.preload().await?;
    } else {
        info!("Model preload disabled; loading on first request");
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{} (POST /predict, GET /health, GET /metrics)", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            let name = shutdown_signal().await;
            warn!("Received {}, draining connections", name);
        })
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Resolves with the name of the first termination signal received.
///
/// A handler that cannot be installed is logged and never fires.
async fn shutdown_signal() -> &'static str {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = interrupt => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}
