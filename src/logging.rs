//! Tracing subscriber setup.
//!
//! The evaluator only emits `tracing` events; nothing is printed until an
//! application installs a subscriber, either its own or the one built here.
//!
//! `DATALOG_LOG` overrides the configured level (any `EnvFilter` directive,
//! e.g. `datalog_evaluator=trace`). `DATALOG_LOG_JSON` overrides the format:
//! `0` selects text, anything else JSON.

use crate::config::{LogFormat, LoggingConfig};
use std::env;
use tracing_subscriber::EnvFilter;

/// Environment variable overriding `logging.level`
pub const LEVEL_ENV: &str = "DATALOG_LOG";

/// Environment variable overriding `logging.format`
pub const JSON_ENV: &str = "DATALOG_LOG_JSON";

/// Filter from `DATALOG_LOG` or `config.level`; an invalid directive falls
/// back to `info`
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    let level = env::var(LEVEL_ENV).unwrap_or_else(|_| config.level.clone());
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Output format from `DATALOG_LOG_JSON` or `config.format`
pub fn log_format(config: &LoggingConfig) -> LogFormat {
    env::var(JSON_ENV).ok().map_or(config.format, |v| {
        if v == "0" {
            LogFormat::Text
        } else {
            LogFormat::Json
        }
    })
}

/// Install a global subscriber writing to stderr
///
/// Returns false if a global subscriber was already set.
pub fn init(config: &LoggingConfig) -> bool {
    let base = tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_writer(std::io::stderr)
        .with_thread_names(true);

    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = match log_format(config) {
        LogFormat::Json => Box::new(base.json().finish()),
        LogFormat::Text => Box::new(base.compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).is_ok()
}
