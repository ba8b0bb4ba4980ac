use clap::Parser;
use log::{error, info};
use monitor_core::effect::SimulatedDelay;
use monitor_core::metrics::{Refresher, SysinfoProvider};
use monitor_server::args::Args;
use monitor_server::config::AppConfig;
use monitor_server::{router, AppState};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = AppConfig::load(&args)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.server.log_level.as_str()),
    )
    .init();
    info!("=== Host Monitor Starting ===");

    // 1. Registries and the worker pool behind them
    let executor = Arc::new(SimulatedDelay::new(config.monitor.delays.clone()));
    let state = AppState::new(&config.monitor, executor, config.server.event_capacity);

    // 2. Background metrics refresher
    let shutdown = CancellationToken::new();
    let provider = Arc::new(SysinfoProvider::new(
        config.monitor.metrics.disk_mount.clone(),
    ));
    let refresher = Refresher::new(
        state.metrics.clone(),
        provider,
        config.monitor.metrics.refresh_period(),
        state.bus.clone(),
    )
    .spawn(shutdown.clone());

    // 3. Routes
    let app = router(state.clone(), &config.server.static_dir);
    let addr = config.server.listen_addr();
    info!("API Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down, cancelling in-flight effects");
    shutdown.cancel();
    state.pool.shutdown();
    refresher.await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
