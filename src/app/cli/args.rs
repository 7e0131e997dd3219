//! Command line arguments
//!
//! Every queue setting is optional on the command line so that values from the config file
//! survive unless a flag overrides them.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "queueset")]
#[command(about = "Sharded work queue with a per-shard worker pool")]
#[command(version, long_version = crate::core::version::long_version())]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Number of shards (and worker threads)
    #[arg(short = 's', long = "shards", value_name = "COUNT")]
    pub shards: Option<usize>,

    /// Total capacity shared by all shards
    #[arg(short = 'm', long = "max-capacity", value_name = "ITEMS")]
    pub max_capacity: Option<usize>,

    /// Items each worker takes per poll
    #[arg(short = 'g', long = "group-size", value_name = "ITEMS")]
    pub group_size: Option<usize>,

    /// Stop each worker once its shard is empty
    #[arg(short = 'a', long = "auto-close")]
    pub auto_close: bool,

    /// Seconds between progress summaries
    #[arg(long = "report-interval", value_name = "SECS")]
    pub report_interval: Option<u64>,

    /// Milliseconds a worker waits on an empty shard before re-checking for a stop
    #[arg(long = "poll-timeout", value_name = "MS")]
    pub poll_timeout: Option<u64>,

    /// Number of demo items to produce
    #[arg(short = 'n', long = "items", value_name = "COUNT", default_value_t = 1000)]
    pub items: usize,

    /// Items per put_batch call
    #[arg(short = 'b', long = "batch", value_name = "ITEMS", default_value_t = 250)]
    pub batch: usize,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", value_parser = ["text", "ext", "json"])]
    pub log_format: Option<String>,

    /// Log file path
    #[arg(short = 'f', long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Force coloured log output on or off (default: on when stderr is a terminal)
    #[arg(long = "color", value_name = "BOOL")]
    pub color: Option<bool>,
}

impl Args {
    pub fn parse_from_env() -> Self {
        Self::parse()
    }

    /// Whether log lines should be coloured
    pub fn use_color(&self) -> bool {
        use std::io::IsTerminal;

        self.color
            .unwrap_or_else(|| self.log_file.is_none() && std::io::stderr().is_terminal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_leave_queue_settings_unset() {
        let args = Args::try_parse_from(["queueset"]).unwrap();

        assert_eq!(args.shards, None);
        assert_eq!(args.group_size, None);
        assert!(!args.auto_close);
        assert_eq!(args.items, 1000);
        assert_eq!(args.batch, 250);
    }

    #[test]
    fn test_queue_flags() {
        let args = Args::try_parse_from([
            "queueset",
            "--shards",
            "8",
            "-m",
            "400",
            "--group-size",
            "16",
            "--auto-close",
            "--log-format",
            "json",
        ])
        .unwrap();

        assert_eq!(args.shards, Some(8));
        assert_eq!(args.max_capacity, Some(400));
        assert_eq!(args.group_size, Some(16));
        assert!(args.auto_close);
        assert_eq!(args.log_format.as_deref(), Some("json"));
    }

    #[test]
    fn test_rejects_unknown_log_format() {
        assert!(Args::try_parse_from(["queueset", "--log-format", "xml"]).is_err());
    }

    #[test]
    fn test_explicit_color_wins() {
        let args = Args::try_parse_from(["queueset", "--color", "false"]).unwrap();
        assert!(!args.use_color());

        let args = Args::try_parse_from(["queueset", "--color", "true"]).unwrap();
        assert!(args.use_color());
    }
}
