//! Prometheus metrics for the registry cache.
//!
//! All metrics follow the naming convention: `registry_cache_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: messages received, events applied, chunks scanned
//! - **Gauge**: watermark block, population state
//! - **Histogram**: batch processing duration

use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Registry holding every registry-cache metric.
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // LIVE CONSUMER
    // =========================================================================

    /// Messages pulled from the bus.
    pub static ref MESSAGES_RECEIVED: Counter = Counter::new(
        "registry_cache_messages_received_total",
        "Blockchain event messages pulled from the bus"
    ).expect("metric creation failed");

    /// Messages acknowledged without processing (at or behind the watermark).
    pub static ref MESSAGES_DUPLICATE: Counter = Counter::new(
        "registry_cache_messages_duplicate_total",
        "Messages discarded because the watermark is already past them"
    ).expect("metric creation failed");

    /// Messages processed and acknowledged.
    pub static ref MESSAGES_PROCESSED: Counter = Counter::new(
        "registry_cache_messages_processed_total",
        "Messages applied to the cache and acknowledged"
    ).expect("metric creation failed");

    /// Messages left unacked after a processing error.
    pub static ref MESSAGE_FAILURES: Counter = Counter::new(
        "registry_cache_message_failures_total",
        "Messages left for redelivery after a processing error"
    ).expect("metric creation failed");

    // =========================================================================
    // EVENTS PROCESSOR
    // =========================================================================

    /// Events applied, by event name.
    pub static ref EVENTS_APPLIED: CounterVec = CounterVec::new(
        Opts::new("registry_cache_events_applied_total", "Events applied to the cache"),
        &["event"]
    ).expect("metric creation failed");

    /// Logs skipped because the emitter is not a registry contract.
    pub static ref LOGS_SKIPPED: Counter = Counter::new(
        "registry_cache_logs_skipped_total",
        "Logs from contracts outside the allow-list"
    ).expect("metric creation failed");

    /// Decoded events with no handler.
    pub static ref EVENTS_UNKNOWN: Counter = Counter::new(
        "registry_cache_events_unknown_total",
        "Events without a registered handler"
    ).expect("metric creation failed");

    /// Block number of the watermark.
    pub static ref WATERMARK_BLOCK: Gauge = Gauge::new(
        "registry_cache_watermark_block",
        "Block number of the last processed event"
    ).expect("metric creation failed");

    /// Batch processing time.
    pub static ref BATCH_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "registry_cache_batch_duration_seconds",
            "Time spent fetching, decoding and applying one block range"
        ).buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 90.0])
    ).expect("metric creation failed");

    // =========================================================================
    // BACKFILL
    // =========================================================================

    /// Backfill chunks by outcome (ok/failed).
    pub static ref BACKFILL_CHUNKS: CounterVec = CounterVec::new(
        Opts::new("registry_cache_backfill_chunks_total", "Backfill block ranges processed"),
        &["outcome"]
    ).expect("metric creation failed");

    /// Population state (0 = initialised, 1 = in progress, 2 = complete).
    pub static ref POPULATION_STATE: Gauge = Gauge::new(
        "registry_cache_population_state",
        "Cache population state"
    ).expect("metric creation failed");
}

/// Register all metrics with the registry. Safe to call more than once.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(MESSAGES_RECEIVED.clone()),
        Box::new(MESSAGES_DUPLICATE.clone()),
        Box::new(MESSAGES_PROCESSED.clone()),
        Box::new(MESSAGE_FAILURES.clone()),
        Box::new(EVENTS_APPLIED.clone()),
        Box::new(LOGS_SKIPPED.clone()),
        Box::new(EVENTS_UNKNOWN.clone()),
        Box::new(WATERMARK_BLOCK.clone()),
        Box::new(BATCH_DURATION.clone()),
        Box::new(BACKFILL_CHUNKS.clone()),
        Box::new(POPULATION_STATE.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics_twice() {
        register_metrics().unwrap();
        register_metrics().unwrap();
    }

    #[test]
    fn test_counter_increment() {
        MESSAGES_RECEIVED.inc();
        assert!(MESSAGES_RECEIVED.get() >= 1.0);
    }

    #[test]
    fn test_labelled_counter() {
        EVENTS_APPLIED.with_label_values(&["NewOwner"]).inc();
        assert!(EVENTS_APPLIED.with_label_values(&["NewOwner"]).get() >= 1.0);
    }

    #[test]
    fn test_encode_contains_registered_metric() {
        register_metrics().unwrap();
        WATERMARK_BLOCK.set(42.0);
        let text = encode_metrics().unwrap();
        assert!(text.contains("registry_cache_watermark_block"));
    }

    #[test]
    fn test_histogram_timer() {
        let _timer = HistogramTimer::new(&BATCH_DURATION);
    }
}
