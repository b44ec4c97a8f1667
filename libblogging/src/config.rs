//! Configuration management for the blogging app

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "BLOGGING_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub simulation: SimulationConfig,
    pub session: SessionConfig,
}

/// Behaviour of the simulated backend
///
/// Latencies are human-readable durations ("2s", "500ms", "0s").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub username: String,
    pub password: String,
    pub authenticate_latency: String,
    pub register_latency: String,
    pub fetch_posts_latency: String,
    pub post_detail_latency: String,
    pub add_comment_latency: String,
    pub delete_latency: String,
    pub load_for_edit_latency: String,
    pub save_latency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Author name stamped on comments written in this session
    pub display_name: String,
}

/// Parsed per-operation latencies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Latencies {
    pub authenticate: Duration,
    pub register: Duration,
    pub fetch_posts: Duration,
    pub post_detail: Duration,
    pub add_comment: Duration,
    pub delete: Duration,
    pub load_for_edit: Duration,
    pub save: Duration,
}

impl Latencies {
    /// No artificial delay anywhere
    pub fn zero() -> Self {
        Self::uniform(Duration::ZERO)
    }

    /// The same delay for every operation
    pub fn uniform(delay: Duration) -> Self {
        Self {
            authenticate: delay,
            register: delay,
            fetch_posts: delay,
            post_detail: delay,
            add_comment: delay,
            delete: delay,
            load_for_edit: delay,
            save: delay,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            username: "user".to_string(),
            password: "pass".to_string(),
            authenticate_latency: "2s".to_string(),
            register_latency: "2s".to_string(),
            fetch_posts_latency: "0s".to_string(),
            post_detail_latency: "1s".to_string(),
            add_comment_latency: "1500ms".to_string(),
            delete_latency: "1s".to_string(),
            load_for_edit_latency: "500ms".to_string(),
            save_latency: "2s".to_string(),
        }
    }
}

impl SimulationConfig {
    /// Parse every latency field
    pub fn latencies(&self) -> Result<Latencies> {
        Ok(Latencies {
            authenticate: parse_latency("authenticate_latency", &self.authenticate_latency)?,
            register: parse_latency("register_latency", &self.register_latency)?,
            fetch_posts: parse_latency("fetch_posts_latency", &self.fetch_posts_latency)?,
            post_detail: parse_latency("post_detail_latency", &self.post_detail_latency)?,
            add_comment: parse_latency("add_comment_latency", &self.add_comment_latency)?,
            delete: parse_latency("delete_latency", &self.delete_latency)?,
            load_for_edit: parse_latency("load_for_edit_latency", &self.load_for_edit_latency)?,
            save: parse_latency("save_latency", &self.save_latency)?,
        })
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            display_name: "Current User".to_string(),
        }
    }
}

fn parse_latency(field: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value.trim()).map_err(|_| {
        ConfigError::InvalidDuration {
            field: format!("simulation.{}", field),
            value: value.to_string(),
        }
        .into()
    })
}

impl Config {
    /// Load configuration from the default location
    ///
    /// A missing file is not an error: the defaults reproduce the stock
    /// simulated backend. A file that exists but fails to parse is.
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        if !config_path.exists() {
            tracing::debug!(path = %config_path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        // Surface bad durations at load time rather than on first backend call
        config.simulation.latencies()?;
        Ok(config)
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("blogging").join("config.toml"))
}
