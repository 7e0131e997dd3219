//! Command line and config file handling

pub mod args;
pub mod config;

pub use args::Args;
pub use config::{ConfigError, QueueSetConfig};
