//! Flash sale HTTP server.

use anyhow::Context;
use flash_sale::{
    config::Config,
    events::BroadcastSink,
    identity::IdentityRegistry,
    metrics::register_business_metrics,
    server::{build_router, cache::StatusCache, with_middleware, AppState, RateLimits},
    FlashSale,
};
use flash_sale_core::environment::SystemClock;
use flash_sale_runtime::metrics::MetricsServer;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,flash_sale=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Flash Sale HTTP Server");

    // Load configuration
    let config = Config::from_env();
    config.validate().context("invalid configuration")?;
    info!(
        total_stock = config.sale.total_stock,
        sale_duration_ms = config.sale.sale_duration_ms,
        pre_sale_delay_ms = config.sale.pre_sale_delay_ms,
        "Configuration loaded"
    );

    // Metrics
    if config.metrics.enabled {
        let mut metrics_server = MetricsServer::new(config.metrics_addr()?);
        metrics_server
            .start()
            .context("failed to start metrics exporter")?;
    }
    register_business_metrics();

    // Sale, events, and the status cache that listens to them
    let events = Arc::new(BroadcastSink::default());
    let sale = FlashSale::from_config(&config, Arc::new(SystemClock), events.clone());
    let status_cache = Arc::new(StatusCache::new(Duration::from_millis(
        config.server.status_cache_ms,
    )));
    let invalidator = status_cache.spawn_invalidator(events.subscribe());

    let state = AppState::new(sale.clone(), Arc::new(IdentityRegistry::new()), status_cache)
        .with_rate_limits(RateLimits::from_config(&config.rate_limit));
    if !config.rate_limit.enabled {
        warn!("Rate limiting disabled");
    }
    let app = with_middleware(build_router(state), &config.server.cors_origin);

    let addr = config.server_addr()?;
    info!(address = %addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, draining sale events");
    if let Err(e) = sale
        .shutdown(Duration::from_secs(config.server.shutdown_timeout))
        .await
    {
        warn!(error = %e, "Sale store did not shut down cleanly");
    }
    invalidator.abort();

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            },
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
