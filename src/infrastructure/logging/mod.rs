//! Structured logging setup (SPEC_FULL §1A "Logging").

pub mod config;
pub mod secret_scrubbing;

pub use config::{LogConfig, LogFormat};
pub use secret_scrubbing::scrub;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, EnvFilter};

/// Initializes the global tracing subscriber. Returns a guard that must be
/// held for the lifetime of the process when file logging is enabled, since
/// dropping it flushes the non-blocking writer.
pub fn init(config: &LogConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let (non_blocking, guard) = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "taskforge.log");
            let (nb, guard) = tracing_appender::non_blocking(appender);
            (Some(nb), Some(guard))
        }
        None => (None, None),
    };

    let builder = fmt().with_env_filter(filter);

    match (non_blocking, config.format) {
        (Some(writer), LogFormat::Json) => {
            builder.json().with_writer(writer).init();
        }
        (Some(writer), LogFormat::Pretty) => {
            builder.with_writer(writer).init();
        }
        (None, LogFormat::Json) => {
            builder.json().init();
        }
        (None, LogFormat::Pretty) => {
            builder.init();
        }
    }

    guard
}
