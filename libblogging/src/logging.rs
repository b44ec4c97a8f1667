//! Logging setup shared by the library consumers and the CLI
//!
//! Controllers log through `tracing`; this module only installs a subscriber.
//! Output always goes to stderr so snapshots printed on stdout stay clean.
//!
//! ```no_run
//! use libblogging::logging::{LoggingConfig, LogFormat};
//!
//! LoggingConfig::new(LogFormat::Json, "debug".to_string(), false).init();
//!
//! // or honor BLOGGING_LOG_FORMAT / BLOGGING_LOG_LEVEL
//! libblogging::logging::init_default();
//! ```

use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Shape of the lines written to stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One plain line per event; what the CLI uses by default
    Text,
    /// One flattened JSON object per event, carrying `screen`, `post_id`
    /// and the other controller fields as top-level keys
    Json,
    /// Multi-line colored output with source locations
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
        };
        f.write_str(name)
    }
}

/// Subscriber settings for a blogging process
///
/// `level` is an `EnvFilter` directive such as `warn` or
/// `libblogging::controller=debug`. `RUST_LOG` wins over both `level` and
/// `verbose` when it is set.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
    /// Show controller `debug!` lines (accepted and rejected actions)
    pub verbose: bool,
}

impl LoggingConfig {
    pub fn new(format: LogFormat, level: String, verbose: bool) -> Self {
        Self {
            format,
            level,
            verbose,
        }
    }

    fn directive(&self) -> &str {
        if self.verbose {
            "debug"
        } else {
            &self.level
        }
    }

    /// Install the global subscriber
    ///
    /// A second call is ignored rather than treated as an error, so tests and
    /// embedding hosts can call it freely.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directive()));

        match self.format {
            LogFormat::Json => {
                tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .flatten_event(true)
                    .with_target(true)
                    .try_init()
                    .ok();
            }
            LogFormat::Pretty => {
                tracing_subscriber::fmt()
                    .pretty()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .with_line_number(true)
                    .with_file(true)
                    .try_init()
                    .ok();
            }
            LogFormat::Text => {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_ansi(false)
                    .try_init()
                    .ok();
            }
        }
    }
}

/// Environment variable selecting the log format
pub const LOG_FORMAT_ENV: &str = "BLOGGING_LOG_FORMAT";

/// Environment variable selecting the minimum level
pub const LOG_LEVEL_ENV: &str = "BLOGGING_LOG_LEVEL";

/// Build a logging configuration from `BLOGGING_LOG_FORMAT` and
/// `BLOGGING_LOG_LEVEL`, falling back to text output at `warn`.
pub fn config_from_env(verbose: bool) -> LoggingConfig {
    let format = std::env::var(LOG_FORMAT_ENV)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LogFormat::Text);

    let level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| "warn".to_string());

    LoggingConfig::new(format, level, verbose)
}

/// Initialize logging with default settings
///
/// ```bash
/// BLOGGING_LOG_FORMAT=json BLOGGING_LOG_LEVEL=debug blogging feed
/// ```
pub fn init_default() {
    config_from_env(false).init();
}
