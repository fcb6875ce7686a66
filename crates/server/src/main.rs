mod bootstrap;
mod health;
mod routes;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use orderdesk_core::config::{AppConfig, LoadOptions};
use orderdesk_core::TransactionCoordinator;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use orderdesk_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    let builder = tracing_subscriber::fmt().with_target(false).with_env_filter(filter);

    match config.logging.format {
        Compact => builder.compact().init(),
        Pretty => builder.pretty().init(),
        Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("could not bind {address}"))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = spawn_sweeper(
        app.coordinator.clone(),
        Duration::from_secs(app.config.coordinator.sweep_interval_secs.max(1)),
        shutdown_rx.clone(),
    );

    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "orderdesk-server started"
    );

    let mut server_shutdown = shutdown_rx.clone();
    let server = axum::serve(listener, routes::router(app.coordinator.clone()))
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.wait_for(|stopping| *stopping).await;
        });
    let server = tokio::spawn(async move { server.await });

    wait_for_shutdown().await?;
    info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "orderdesk-server stopping"
    );
    let _ = shutdown_tx.send(true);

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, server).await {
        Ok(joined) => joined.context("server task panicked")??,
        Err(_) => warn!(
            event_name = "system.server.shutdown_timeout",
            correlation_id = "shutdown",
            grace_secs = grace.as_secs(),
            "in-flight requests did not finish before the grace period"
        ),
    }
    sweeper.abort();

    Ok(())
}

/// Periodically expires stale approvals and evicts idle sessions.
fn spawn_sweeper(
    coordinator: Arc<TransactionCoordinator>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    coordinator.sweep_expired().await;
                }
                _ = shutdown.changed() => break,
            }
        }
    })
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
