//! TOML configuration and CLI override tests

use crate::common::config_file;
use clap::Parser;
use queueset::app::cli::{Args, ConfigError, QueueSetConfig};
use queueset::app::demo::build_listener;
use std::time::Duration;

#[test]
fn test_full_config_file() {
    let file = config_file(
        r#"
shards = 6
max-capacity = 600
group-size = 12
auto-close = true
report-interval-secs = 5
poll-timeout-ms = 20
"#,
    );

    let config = QueueSetConfig::load(Some(file.path())).unwrap();

    assert_eq!(
        config,
        QueueSetConfig {
            shards: 6,
            max_capacity: 600,
            group_size: 12,
            auto_close: true,
            report_interval_secs: 5,
            poll_timeout_ms: 20,
            log_level: None,
        }
    );
    assert_eq!(config.poll_timeout(), Duration::from_millis(20));
}

#[test]
fn test_wrong_value_type_is_parse_error() {
    let file = config_file("shards = \"four\"\n");

    match QueueSetConfig::load(Some(file.path())) {
        Err(ConfigError::Parse { path, .. }) => assert_eq!(path, file.path()),
        other => panic!("Expected Parse error, got {:?}", other),
    }
}

#[test]
fn test_cli_overrides_and_builds_listener() {
    let file = config_file("shards = 2\ngroup-size = 3\n");
    let args = Args::try_parse_from([
        "queueset",
        "--config-file",
        file.path().to_str().unwrap(),
        "--shards",
        "5",
        "--auto-close",
    ])
    .unwrap();

    let mut config = QueueSetConfig::load(args.config_file.as_deref()).unwrap();
    config.apply_args(&args);
    config.validate().unwrap();

    let listener = build_listener(&config).unwrap();
    assert_eq!(listener.queue_set().configured_shards(), 5);
    assert_eq!(listener.group_size(), 3);
    assert!(listener.auto_close());
    assert_eq!(listener.receiver_name(), "LoggingReceiver");
}

#[test]
fn test_zero_shards_from_cli_fails_validation() {
    let args = Args::try_parse_from(["queueset", "--shards", "0"]).unwrap();
    let mut config = QueueSetConfig::default();
    config.apply_args(&args);

    assert!(matches!(
        config.validate(),
        Err(ConfigError::Invalid { .. })
    ));
}
