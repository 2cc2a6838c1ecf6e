//! Trellis server binary
//!
//! Spawns one worker process per configured device, then serves the HTTP
//! and websocket API until ctrl-c. Workers that fail to start are logged
//! and skipped; the server still runs, with job submission disabled when
//! none survive.

use std::path::PathBuf;
use std::sync::Arc;

use executor::{Executor, TokioProcessSpawner};
use trellis_server::constants::workers;
use trellis_server::{routes, AppState, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
    log::info!("Trellis starting...");

    let config = ServerConfig::from_env();
    let registry = Arc::new(graph_nodes::registry());

    let worker_binary = resolve_worker_binary(&config);
    let spawner = TokioProcessSpawner;
    let mut executors = Vec::new();
    for device in &config.devices {
        match Executor::spawn(&spawner, &worker_binary.to_string_lossy(), device).await {
            Ok(executor) => executors.push(executor),
            Err(err) => log::error!("failed to start worker for {}: {}", device, err),
        }
    }
    if executors.is_empty() {
        log::warn!("no workers are running, job submission is disabled");
    }

    let state = AppState::build(registry, executors);
    let app = routes::router(state.clone());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr()).await?;
    log::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.shutdown().await;
    log::info!("Trellis stopped");
    Ok(())
}

/// Locate the worker binary: explicit override, then next to the server
/// executable, then `$PATH`
fn resolve_worker_binary(config: &ServerConfig) -> PathBuf {
    if let Some(path) = &config.worker_binary {
        return path.clone();
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(workers::BINARY)))
        .unwrap_or_else(|| PathBuf::from(workers::BINARY))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::error!("failed to listen for shutdown signal: {}", err);
        return;
    }
    log::info!("shutdown signal received");
}
