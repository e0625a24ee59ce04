//! Log dispatch construction.
//!
//! No global subscriber is installed. The dispatch built here is handed to
//! the batch runner and scoped around the command.

use tracing::level_filters::LevelFilter;
use tracing::Dispatch;

use leadsync_config::LogLevel;

pub fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Error => LevelFilter::ERROR,
    }
}

/// Structured log lines on stderr at or above `level`.
pub fn dispatch_for(level: LogLevel) -> Dispatch {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level_filter(level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    Dispatch::new(subscriber)
}
