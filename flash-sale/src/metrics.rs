//! Business metrics for the flash sale.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `flash_sale_purchase_attempts_total{outcome}` - Purchase attempts by outcome
//!   (accepted, not_active, already_purchased, sold_out)
//! - `flash_sale_windows_opened_total` - Sale windows opened (including resets)
//! - `flash_sale_sold_out_total` - Windows that sold their last unit
//! - `flash_sale_status_cache_total{result}` - Status cache lookups (hit, miss)
//! - `flash_sale_rate_limited_total{limit}` - Requests refused by a rate limit (general, purchase)
//!
//! ## Gauges
//! - `flash_sale_remaining_stock` - Units left in the current window

use crate::events::SaleEvent;
use crate::types::PurchaseOutcome;
use metrics::{describe_counter, describe_gauge};

/// Initialize and register all business metrics descriptions.
///
/// This should be called once at application startup, before any metrics are recorded.
pub fn register_business_metrics() {
    describe_counter!(
        "flash_sale_purchase_attempts_total",
        "Total number of purchase attempts by outcome"
    );
    describe_counter!(
        "flash_sale_windows_opened_total",
        "Total number of sale windows opened"
    );
    describe_counter!(
        "flash_sale_sold_out_total",
        "Total number of windows that sold out"
    );
    describe_counter!(
        "flash_sale_status_cache_total",
        "Status cache lookups by result (hit, miss)"
    );
    describe_counter!(
        "flash_sale_rate_limited_total",
        "Requests refused by a rate limit (general, purchase)"
    );
    describe_gauge!(
        "flash_sale_remaining_stock",
        "Units left in the current sale window"
    );

    tracing::info!("Business metrics registered");
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record the outcome of a purchase attempt.
pub fn record_purchase_attempt(outcome: &PurchaseOutcome) {
    let label = outcome.as_label();
    metrics::counter!("flash_sale_purchase_attempts_total", "outcome" => label).increment(1);
    tracing::debug!(outcome = label, "Recorded purchase_attempt metric");
}

/// Record the metrics a sale event implies.
pub fn record_sale_event(event: &SaleEvent) {
    match event {
        SaleEvent::WindowOpened { total_stock, .. } => {
            metrics::counter!("flash_sale_windows_opened_total").increment(1);
            metrics::gauge!("flash_sale_remaining_stock").set(f64::from(*total_stock));
        },
        SaleEvent::PurchaseAccepted {
            remaining_stock, ..
        } => {
            metrics::gauge!("flash_sale_remaining_stock").set(f64::from(*remaining_stock));
        },
        SaleEvent::SoldOut { .. } => {
            metrics::counter!("flash_sale_sold_out_total").increment(1);
        },
    }
}

/// Record a status cache lookup.
pub fn record_status_cache(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!("flash_sale_status_cache_total", "result" => result).increment(1);
}

/// Record a request refused by the named rate limit.
pub fn record_rate_limited(limit: &'static str) {
    metrics::counter!("flash_sale_rate_limited_total", "limit" => limit).increment(1);
}
