//! PayFast (Pakistan) payment gateway integration.
//!
//! Card payments run through the 3DS pre-check / OTP / completion flow,
//! wallet payments through EasyPaisa and UPaisa bank codes. Reconciliation
//! is driven by the IPN webhook and a pending-payment poller, both built on
//! idempotent, compare-and-swap state transitions.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod gateway;
pub mod services;
pub mod workers;

use config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber from the logging config.
/// `RUST_LOG` overrides the configured level.
pub fn init_tracing(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_lowercase()));

    match config.format {
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .init();
        }
        LogFormat::Plain => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}
