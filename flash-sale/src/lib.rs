//! Flash Sale - time-windowed purchase admission for a single product
//!
//! A fixed stock of one product goes on sale inside a time window. Many buyers
//! race for it; each identity may claim at most one unit, and the stock never
//! goes negative no matter how many requests arrive at once.
//!
//! # Architecture
//!
//! ```text
//!   HTTP (axum)                 FlashSale handle             Store (runtime)
//! ┌──────────────┐   clock   ┌──────────────────┐  action  ┌──────────────────┐
//! │ /state       │──────────▶│ current_state    │─────────▶│ RwLock<Ledger>   │
//! │ /purchase    │           │ attempt_purchase │          │  SaleReducer     │
//! │ /stats ...   │◀──────────│ stats, reset ... │◀─────────│  (lifecycle,     │
//! └──────────────┘   view    └──────────────────┘ inspect  │   admission)     │
//!        ▲                                                 └────────┬─────────┘
//!        │ invalidate                                        effect │
//!        │                                                          ▼
//! ┌──────────────┐                                         ┌──────────────────┐
//! │ StatusCache  │◀────────────────────────────────────────│ SaleEventSink    │
//! └──────────────┘                                         └──────────────────┘
//! ```
//!
//! Every mutation (opening a window, claiming a unit, resetting) is one
//! reducer call under the store's write lock. Reads take the shared read lock
//! and never see a half-applied claim.
//!
//! # Example
//!
//! ```
//! use flash_sale::{events::MemorySink, lifecycle::SaleSchedule, FlashSale, Identity, Product};
//! use flash_sale_core::environment::SystemClock;
//! use std::sync::Arc;
//!
//! # tokio_test::block_on(async {
//! let sale = FlashSale::new(
//!     Product {
//!         id: "prod_1".to_string(),
//!         name: "Watch".to_string(),
//!         description: String::new(),
//!         image_url: String::new(),
//!         total_stock: 5,
//!     },
//!     SaleSchedule::from_millis(0, 60_000),
//!     Arc::new(SystemClock),
//!     Arc::new(MemorySink::new()),
//! );
//!
//! let outcome = sale.attempt_purchase(&Identity::new("user_alice")).await?;
//! assert!(outcome.accepted);
//! assert_eq!(sale.stats().await.remaining_stock, 4);
//! # Ok::<(), flash_sale::SaleError>(())
//! # }).unwrap();
//! ```

pub mod admission;
pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod lifecycle;
pub mod metrics;
pub mod projection;
pub mod reducer;
pub mod server;
pub mod service;
pub mod state;
pub mod types;

pub use config::Config;
pub use error::{InvariantViolation, SaleError};
pub use service::FlashSale;
pub use types::{Identity, Product, PurchaseOutcome, Rejection, SaleStats, SaleStatus, SaleView};
