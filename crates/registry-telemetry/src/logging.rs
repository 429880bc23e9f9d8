//! Structured logging.
//!
//! Console output is human readable in development and JSON in containers.
//! JSON lines carry `timestamp`, `level`, `target`, the message and every
//! structured field, so log shippers can index them without parsing text.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::{TelemetryConfig, TelemetryError};

/// Install the global `tracing` subscriber.
///
/// Fails if a global subscriber is already set or the level directive does
/// not parse.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::Config(format!("log level [{}]: {}", config.log_level, e)))?;

    let console = if !config.console_output {
        None
    } else if config.json_logs {
        Some(
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_thread_ids(true)
                .boxed(),
        )
    } else {
        Some(fmt::layer().with_target(true).with_ansi(true).boxed())
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .try_init()
        .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;

    tracing::info!(
        service = %config.service_name,
        level = %config.log_level,
        json_logs = config.json_logs,
        "Logging initialized"
    );
    Ok(())
}

/// Log an event tied to a chain position with the standard fields
/// `block_number`, `transaction_index` and `log_index`.
#[macro_export]
macro_rules! log_chain_event {
    ($level:ident, $msg:expr, $position:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            block_number = $position.block_number,
            transaction_index = $position.transaction_index,
            log_index = $position.log_index,
            $($($field)*,)?
            $msg
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_is_config_error() {
        let config = TelemetryConfig {
            log_level: "registry=loud".to_string(),
            ..TelemetryConfig::default()
        };
        assert!(matches!(
            init_logging(&config),
            Err(TelemetryError::Config(_))
        ));
    }

    #[test]
    fn test_log_chain_event_macro_expands() {
        struct Position {
            block_number: u64,
            transaction_index: u64,
            log_index: u64,
        }
        let position = Position {
            block_number: 1,
            transaction_index: 2,
            log_index: 3,
        };
        crate::log_chain_event!(debug, "event applied", position, event = "NewOwner");
        crate::log_chain_event!(info, "event applied", position);
    }
}
