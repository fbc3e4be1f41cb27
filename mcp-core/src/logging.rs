use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogFormat;

/// Initializes the global `tracing` subscriber once at process startup,
/// an `EnvFilter`
/// seeded from `LOG_LEVEL`, with either human-readable or JSON output.
pub fn init(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt().with_env_filter(filter).with_target(true);

    match format {
        LogFormat::Json => {
            let _ = builder.json().try_init();
        }
        LogFormat::Text => {
            let _ = builder.try_init();
        }
    }
}
