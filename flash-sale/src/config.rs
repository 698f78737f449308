//! Configuration management for the flash sale service.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::lifecycle::SaleSchedule;
use crate::types::Product;
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use thiserror::Error;

/// Default product identifier
pub const DEFAULT_PRODUCT_ID: &str = "prod_123";
/// Default product name
pub const DEFAULT_PRODUCT_NAME: &str = "Smart Watch New in 2025";
/// Default product description
pub const DEFAULT_PRODUCT_DESCRIPTION: &str = "Experience the future with the 2025 edition Smart Watch. \
     Featuring a brand new design, enhanced battery life, and futuristic AI capabilities.";
/// Default product image
pub const DEFAULT_PRODUCT_IMAGE_URL: &str = "https://images.unsplash.com/photo-1546868871-7041f2a55e12\
     ?ixlib=rb-4.0.3&ixid=M3wxMjA3fDB8MHxwaG90by1wYWdlfHx8fGVufDB8fHx8fA%3D%3D\
     &auto=format&fit=crop&w=1528&q=80";

/// Invalid configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Stock must be positive
    #[error("PRODUCT_STOCK must be greater than 0")]
    ZeroStock,
    /// Sale windows must have a length
    #[error("FLASH_SALE_DURATION_MS must be greater than 0")]
    ZeroSaleDuration,
    /// Host and port do not form a socket address
    #[error("invalid {name} address {value}")]
    InvalidAddress {
        /// Which address
        name: &'static str,
        /// Offending value
        value: String,
    },
    /// An enabled rate limit must admit at least one request per non-empty window
    #[error("{name} rate limit needs a positive request budget and window")]
    InvalidRateLimit {
        /// Which limit
        name: &'static str,
    },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Sale settings
    pub sale: SaleConfig,
    /// Product presentation
    pub product: ProductConfig,
    /// HTTP server settings
    pub server: ServerConfig,
    /// Prometheus exporter settings
    pub metrics: MetricsConfig,
    /// Per-client request throttling
    pub rate_limit: RateLimitConfig,
}

/// Sale configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleConfig {
    /// Units per window
    pub total_stock: u32,
    /// Window length in milliseconds
    pub sale_duration_ms: u64,
    /// Gap between (re)initialization and window start in milliseconds
    pub pre_sale_delay_ms: u64,
}

impl SaleConfig {
    /// Window timing described by this configuration
    #[must_use]
    pub fn schedule(&self) -> SaleSchedule {
        SaleSchedule::from_millis(self.pre_sale_delay_ms, self.sale_duration_ms)
    }
}

/// Product presentation fields
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductConfig {
    /// Product identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Marketing copy
    pub description: String,
    /// Image URL
    pub image_url: String,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Allowed CORS origin
    pub cors_origin: String,
    /// How long a status response is served from cache, in milliseconds
    pub status_cache_ms: u64,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
}

/// Metrics exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether to start the exporter
    pub enabled: bool,
    /// Metrics server host (for Prometheus scraping)
    pub host: String,
    /// Metrics server port
    pub port: u16,
}

/// Per-client rate limit configuration
///
/// Every route except the sale status endpoint shares the general budget;
/// purchase attempts are additionally held to a stricter one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Whether requests are throttled at all
    pub enabled: bool,
    /// Requests allowed per client in each general window
    pub max_requests: u32,
    /// General window length in milliseconds
    pub window_ms: u64,
    /// Purchase attempts allowed per client in each purchase window
    pub purchase_max_requests: u32,
    /// Purchase window length in milliseconds
    pub purchase_window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 100,
            window_ms: 15 * 60 * 1000,
            purchase_max_requests: 10,
            purchase_window_ms: 60 * 1000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Unset or unparsable values fall back to their defaults.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            sale: SaleConfig {
                total_stock: lookup("PRODUCT_STOCK")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
                sale_duration_ms: lookup("FLASH_SALE_DURATION_MS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300_000),
                pre_sale_delay_ms: lookup("PRE_SALE_WAIT_MS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30_000),
            },
            product: ProductConfig {
                id: lookup("PRODUCT_ID").unwrap_or_else(|| DEFAULT_PRODUCT_ID.to_string()),
                name: lookup("PRODUCT_NAME").unwrap_or_else(|| DEFAULT_PRODUCT_NAME.to_string()),
                description: lookup("PRODUCT_DESCRIPTION")
                    .unwrap_or_else(|| DEFAULT_PRODUCT_DESCRIPTION.to_string()),
                image_url: lookup("PRODUCT_IMAGE_URL")
                    .unwrap_or_else(|| DEFAULT_PRODUCT_IMAGE_URL.to_string()),
            },
            server: ServerConfig {
                host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: lookup("PORT")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3001),
                cors_origin: lookup("CORS_ORIGIN")
                    .unwrap_or_else(|| "http://localhost:5173".to_string()),
                status_cache_ms: lookup("STATUS_CACHE_MS")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1_000),
                shutdown_timeout: lookup("SHUTDOWN_TIMEOUT")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            },
            metrics: MetricsConfig {
                enabled: lookup("METRICS_ENABLED")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(true),
                host: lookup("METRICS_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: lookup("METRICS_PORT")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(9090),
            },
            rate_limit: {
                let defaults = RateLimitConfig::default();
                RateLimitConfig {
                    enabled: lookup("RATE_LIMIT_ENABLED")
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(defaults.enabled),
                    max_requests: lookup("RATE_LIMIT_MAX")
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(defaults.max_requests),
                    window_ms: lookup("RATE_LIMIT_WINDOW_MS")
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(defaults.window_ms),
                    purchase_max_requests: lookup("RATE_LIMIT_PURCHASE_MAX")
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(defaults.purchase_max_requests),
                    purchase_window_ms: lookup("RATE_LIMIT_PURCHASE_WINDOW_MS")
                        .and_then(|s| s.parse().ok())
                        .unwrap_or(defaults.purchase_window_ms),
                }
            },
        }
    }

    /// Check values the defaults cannot repair.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sale.total_stock == 0 {
            return Err(ConfigError::ZeroStock);
        }
        if self.sale.sale_duration_ms == 0 {
            return Err(ConfigError::ZeroSaleDuration);
        }
        self.server_addr()?;
        if self.metrics.enabled {
            self.metrics_addr()?;
        }
        let limits = &self.rate_limit;
        if limits.enabled {
            if limits.max_requests == 0 || limits.window_ms == 0 {
                return Err(ConfigError::InvalidRateLimit { name: "general" });
            }
            if limits.purchase_max_requests == 0 || limits.purchase_window_ms == 0 {
                return Err(ConfigError::InvalidRateLimit { name: "purchase" });
            }
        }
        Ok(())
    }

    /// The product described by this configuration
    #[must_use]
    pub fn product(&self) -> Product {
        Product {
            id: self.product.id.clone(),
            name: self.product.name.clone(),
            description: self.product.description.clone(),
            image_url: self.product.image_url.clone(),
            total_stock: self.sale.total_stock,
        }
    }

    /// Address the HTTP server binds to
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] if host and port do not parse.
    pub fn server_addr(&self) -> Result<SocketAddr, ConfigError> {
        socket_addr("server", &self.server.host, self.server.port)
    }

    /// Address the metrics exporter binds to
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] if host and port do not parse.
    pub fn metrics_addr(&self) -> Result<SocketAddr, ConfigError> {
        socket_addr("metrics", &self.metrics.host, self.metrics.port)
    }
}

fn socket_addr(name: &'static str, host: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    let value = format!("{host}:{port}");
    value
        .parse()
        .map_err(|_| ConfigError::InvalidAddress { name, value })
}
