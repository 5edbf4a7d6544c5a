//! # Custody Telemetry
//!
//! Logging and metrics for the custody ledger node.
//!
//! ## Components
//!
//! - **Logs**: `tracing-subscriber` with an `EnvFilter`, pretty or JSON, on stderr
//! - **Metrics**: Prometheus counters in a private registry, rendered on demand
//!
//! ## Usage
//!
//! ```rust,ignore
//! use custody_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(&TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CC_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `CC_JSON_LOGS` | `false` | JSON log lines |
//! | `CC_CONSOLE_OUTPUT` | `true` | Emit logs at all |
//! | `CC_SERVICE_NAME` | `custody-node` | Service name |

mod config;
pub mod metrics;
mod tracing_setup;

pub use config::TelemetryConfig;
pub use metrics::{encode_metrics, register_metrics, HistogramTimer, MetricsHandle};
pub use tracing_setup::init_tracing;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and metrics.
///
/// Returns a guard to hold for the lifetime of the application.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = register_metrics()?;
    init_tracing(config)?;
    Ok(TelemetryGuard { _metrics: metrics })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}
