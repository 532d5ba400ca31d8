//! SAR Server - simulation loop plus REST and streaming APIs

use anyhow::Result;
use axum::{middleware, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sar_server::api::{self, request_id::ensure_request_id};
use sar_server::config::{Config, LogFormat};
use sar_server::loops::simulation_loop::run_simulation_loop;
use sar_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env();

    // Initialize tracing
    let filter = EnvFilter::from_default_env().add_directive("sar_server=debug".parse()?);
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json()).init(),
        LogFormat::Text => registry.with(fmt::layer()).init(),
    }

    tracing::info!("Starting SAR Server...");

    let port = config.server_port;
    let state = Arc::new(AppState::new(config));

    // Start the simulation loop
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let sim = tokio::spawn(run_simulation_loop(state.clone(), shutdown_rx));

    // Build the app
    let app = api::routes()
        .route("/health", get(|| async { "OK" }))
        .with_state(state)
        .layer(middleware::from_fn(ensure_request_id))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Run server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", err);
            }
            tracing::info!("Shutdown requested");
            let _ = shutdown_tx.send(());
        })
        .await?;

    sim.await?;
    Ok(())
}
