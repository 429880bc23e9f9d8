//! # Registry Telemetry
//!
//! Logging and metrics for the registry cache services.
//!
//! ## Components
//!
//! - **Logs**: `tracing` subscriber, pretty in development and JSON in
//!   containers, filtered with `EnvFilter` directives.
//! - **Metrics**: Prometheus counters and gauges on a dedicated registry,
//!   rendered by the node's `/metrics` endpoint.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use registry_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     let _guard = init_telemetry(&TelemetryConfig::from_env()).expect("telemetry");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `REGISTRY_SERVICE_NAME` | `api-registry` | Service name in logs |
//! | `REGISTRY_LOG_LEVEL` | `info` | Log level filter |
//! | `REGISTRY_JSON_LOGS` | `false` (`true` in containers) | JSON output |
//! | `REGISTRY_METRICS_ENABLED` | `true` | Register Prometheus metrics |

#![warn(missing_docs)]

mod config;
mod logging;
pub mod metrics;

pub use config::{parse_flag, TelemetryConfig};
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, register_metrics, HistogramTimer, BACKFILL_CHUNKS, BATCH_DURATION,
    EVENTS_APPLIED, EVENTS_UNKNOWN, LOGS_SKIPPED, MESSAGES_DUPLICATE, MESSAGES_PROCESSED,
    MESSAGES_RECEIVED, MESSAGE_FAILURES, POPULATION_STATE, WATERMARK_BLOCK,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The global subscriber could not be installed.
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    /// Metrics could not be registered or encoded.
    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    /// Invalid configuration value.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and metrics.
///
/// Returns a guard that should be held for the lifetime of the application.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    if config.metrics_enabled {
        register_metrics()?;
    }
    init_logging(config)?;

    Ok(TelemetryGuard {
        service_name: config.service_name.clone(),
    })
}

/// Guard that keeps telemetry active. Logs on drop.
pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}

/// Convenience macro for recording a metric increment.
#[macro_export]
macro_rules! metric_inc {
    ($metric:expr) => {
        $metric.inc()
    };
    ($metric:expr, $labels:expr) => {
        $metric.with_label_values($labels).inc()
    };
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_inc_macro() {
        let before = MESSAGES_PROCESSED.get();
        metric_inc!(MESSAGES_PROCESSED);
        assert!(MESSAGES_PROCESSED.get() >= before + 1.0);
        metric_inc!(BACKFILL_CHUNKS, &["ok"]);
    }

    #[test]
    fn test_time_histogram_macro() {
        let _timer = time_histogram!(BATCH_DURATION);
    }
}
