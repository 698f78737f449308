//! Prometheus metrics for observability and monitoring.
//!
//! Registers descriptions for the runtime metrics and installs the Prometheus
//! exporter with its own HTTP listener.
//!
//! # Example
//!
//! ```rust,no_run
//! use flash_sale_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Serve metrics on port 9090
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics server.
///
/// Exposes metrics on an HTTP endpoint for Prometheus scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    started: bool,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Socket address to bind to (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            started: false,
        }
    }

    /// Address the exporter listens on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Whether the exporter was installed by this server.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.started
    }

    /// Register metric descriptions and install the Prometheus exporter.
    ///
    /// Must be called from within a Tokio runtime; the exporter spawns its HTTP
    /// listener onto it.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed. A recorder
    /// that is already installed (e.g., in tests) is tolerated with a warning.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install() {
            Ok(()) => {
                self.started = true;
                tracing::info!(
                    addr = %self.addr,
                    "Metrics server started - available at http://{}/metrics",
                    self.addr
                );
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }
}

/// Register all runtime metric descriptions.
fn register_metrics() {
    describe_counter!("store_actions_total", "Total number of actions reduced by stores");
    describe_counter!(
        "store_effects_executed_total",
        "Total number of effects executed by type"
    );
    describe_histogram!(
        "store_reduce_duration_seconds",
        "Time spent holding the state write lock per reduction"
    );
}
