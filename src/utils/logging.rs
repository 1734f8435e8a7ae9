//! Logging initialization
//!
//! Standard tracing setup: respects `RUST_LOG`, falls back to the config
//! filter, defaults to "info". JSON output is available behind the
//! `json-logging` feature for log aggregation systems.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging.
///
/// `RUST_LOG` takes precedence over the config filter; with neither set the
/// level defaults to "info". Call once at startup.
pub fn init_logging(filter: Option<&str>) {
    let env_filter = resolve_filter(filter);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_ansi(std::env::var("NO_COLOR").is_err()),
        )
        .with(env_filter)
        .init();
}

/// Initialize logging with JSON output (production/monitoring).
#[cfg(feature = "json-logging")]
pub fn init_json_logging(filter: Option<&str>) {
    let env_filter = resolve_filter(filter);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .with_span_list(true),
        )
        .with(env_filter)
        .init();
}

/// Initialize logging from application configuration.
pub fn init_logging_from_config(config: Option<&crate::config::LoggingConfig>) {
    let filter = config.and_then(|c| c.filter.as_deref());

    if config.map(|c| c.json_format).unwrap_or(false) {
        #[cfg(feature = "json-logging")]
        {
            init_json_logging(filter);
            return;
        }
    }
    init_logging(filter);
}

fn resolve_filter(filter: Option<&str>) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(filter.unwrap_or("info"))
    }
}
