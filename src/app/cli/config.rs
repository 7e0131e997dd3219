//! TOML configuration file loading
//!
//! The config file holds the queue settings; command line flags are applied on top of it.
//!
//! ```toml
//! shards = 8
//! max-capacity = 20000
//! group-size = 32
//! auto-close = true
//! report-interval-secs = 30
//! poll-timeout-ms = 50
//! log-level = "debug"
//! ```

use super::args::Args;
use crate::core::error_handling::ContextualError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("The specified configuration file does not exist: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("Error reading configuration file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Error parsing configuration file {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl ContextualError for ConfigError {
    fn is_user_actionable(&self) -> bool {
        !matches!(self, ConfigError::Read { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ConfigError::Invalid { message } | ConfigError::Parse { message, .. } => {
                Some(message)
            }
            ConfigError::NotFound { .. } => Some("The specified configuration file does not exist"),
            ConfigError::Read { .. } => None,
        }
    }
}

/// Queue settings for the `queueset` binary
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct QueueSetConfig {
    pub shards: usize,
    pub max_capacity: usize,
    pub group_size: usize,
    pub auto_close: bool,
    pub report_interval_secs: u64,
    pub poll_timeout_ms: u64,
    /// Applied after startup unless `--log-level` was given
    pub log_level: Option<String>,
}

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

impl Default for QueueSetConfig {
    fn default() -> Self {
        Self {
            shards: 4,
            max_capacity: 10_000,
            group_size: 1,
            auto_close: false,
            report_interval_secs: 60,
            poll_timeout_ms: 100,
            log_level: None,
        }
    }
}

impl QueueSetConfig {
    /// `<config dir>/queueset/queueset.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("queueset").join("queueset.toml"))
    }

    /// Load the explicit file, or the default file if it exists, or the built-in defaults
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match config_file {
            Some(path) if !path.exists() => {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|path| path.exists()),
        };

        match path {
            Some(path) => {
                log::debug!("Loading configuration from {}", path.display());
                Self::from_file(&path)
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.message().to_string(),
        })
    }

    /// Override file values with the flags given on the command line
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(shards) = args.shards {
            self.shards = shards;
        }
        if let Some(max_capacity) = args.max_capacity {
            self.max_capacity = max_capacity;
        }
        if let Some(group_size) = args.group_size {
            self.group_size = group_size;
        }
        if args.auto_close {
            self.auto_close = true;
        }
        if let Some(secs) = args.report_interval {
            self.report_interval_secs = secs;
        }
        if let Some(ms) = args.poll_timeout {
            self.poll_timeout_ms = ms;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("shards", self.shards as u64),
            ("max-capacity", self.max_capacity as u64),
            ("group-size", self.group_size as u64),
            ("report-interval-secs", self.report_interval_secs),
            ("poll-timeout-ms", self.poll_timeout_ms),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid {
                message: format!("{} must be greater than zero", name),
            });
        }

        if let Some(level) = self.log_level.as_deref() {
            if !LOG_LEVELS.contains(&level) {
                return Err(ConfigError::Invalid {
                    message: format!(
                        "log-level must be one of {}, not '{}'",
                        LOG_LEVELS.join(", "),
                        level
                    ),
                });
            }
        }

        if self.max_capacity < self.shards {
            log::warn!(
                "max-capacity {} is below the shard count {}; shards will be unusable",
                self.max_capacity,
                self.shards
            );
        }
        Ok(())
    }

    /// The file's log level, when the command line did not set one
    pub fn log_level_override<'a>(&'a self, args: &Args) -> Option<&'a str> {
        match args.log_level {
            Some(_) => None,
            None => self.log_level.as_deref(),
        }
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}
