//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - datalog.toml (default configuration)
//! - datalog.local.toml (git-ignored local overrides)
//! - Environment variables (DATALOG_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # datalog.toml
//! [evaluator]
//! use_index = true
//! use_cache = false
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! DATALOG_EVALUATOR__USE_CACHE=true
//! DATALOG_LOGGING__LEVEL=trace
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration struct
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which dataset capabilities the evaluator may use
///
/// Turning a capability off never changes the answers of a non-recursive
/// query, only how they are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Query `IndexedScan` datasets instead of scanning every tuple
    #[serde(default = "default_true")]
    pub use_index: bool,

    /// Memoize rule results on `RuleCache` datasets
    #[serde(default = "default_true")]
    pub use_cache: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from the default locations
    ///
    /// Missing files are skipped; every field has a default.
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment()
            .merge(Toml::file("datalog.toml"))
            .merge(Toml::file("datalog.local.toml"))
            .merge(Env::prefixed("DATALOG_").split("__"))
            .extract()
    }

    /// Load configuration from a specific file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, figment::Error> {
        Self::figment().merge(Toml::file(path)).extract()
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
    }
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        EvaluatorConfig {
            use_index: true,
            use_cache: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
