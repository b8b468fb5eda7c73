use gatehouse_core::Result;
use gatehouse_server::{config::ServerConfig, error::ServerError, routes, state::AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(config_path()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "gatehouse stopped");
            ExitCode::FAILURE
        }
    }
}

/// Reads `--config <path>` or a bare first argument.
fn config_path() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    match args.next()?.as_str() {
        "--config" | "-c" => args.next().map(PathBuf::from),
        path => Some(PathBuf::from(path)),
    }
}

async fn run(config_path: Option<PathBuf>) -> Result<(), ServerError> {
    let config = ServerConfig::load(config_path.as_deref())?;
    tracing::info!(address = %config.address, "Loaded configuration");

    let state = Arc::new(AppState::from_config(&config).await?);
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(config.address)
        .await
        .map_err(|e| ServerError::Bind {
            address: config.address,
            details: e.to_string(),
        })?;

    tracing::info!("listening on http://{}", config.address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| ServerError::Serve {
        details: e.to_string(),
    })?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
