use crate::app::cli::{Args, QueueSetConfig};
use crate::app::demo;
use crate::core::error_handling::{fatal_message, log_error_with_context, ContextualError};
use crate::core::logging::{init_logging, reconfigure_logging};
use crate::core::shutdown::{ShutdownCoordinator, FORCED_EXIT_CODE};

/// Parse arguments, set up logging and run the demo workload; returns the exit code
pub async fn startup() -> i32 {
    let args = Args::parse_from_env();

    let log_file = args.log_file.as_ref().map(|p| p.to_string_lossy().to_string());
    if let Err(e) = init_logging(
        args.log_level.as_deref(),
        args.log_format.as_deref(),
        log_file.as_deref(),
        args.use_color(),
    ) {
        eprintln!("Error initialising logging: {}", e);
        return 1;
    }

    log::info!(
        "queueset {} starting",
        crate::core::version::long_version()
    );

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => return fail(&e, "Loading configuration"),
    };
    if let Some(level) = config.log_level_override(&args) {
        if let Err(e) = reconfigure_logging(level) {
            log::warn!("Could not apply log-level '{}' from config: {}", level, e);
        }
    }
    log::debug!("Effective configuration: {:?}", config);

    let result = ShutdownCoordinator::guard(|coordinator, mut shutdown_rx| async move {
        demo::run(&config, args.items, args.batch, &coordinator, &mut shutdown_rx).await
    })
    .await;

    match result {
        Ok(report) => {
            println!("{}", report.summary);
            if report.rejected > 0 {
                log::warn!("{} items were rejected by full shards", report.rejected);
            }
            if report.interrupted {
                FORCED_EXIT_CODE
            } else {
                0
            }
        }
        Err(e) => fail(&e, "Running queue set"),
    }
}

fn load_config(args: &Args) -> Result<QueueSetConfig, crate::app::cli::ConfigError> {
    let mut config = QueueSetConfig::load(args.config_file.as_deref())?;
    config.apply_args(args);
    config.validate()?;
    Ok(config)
}

fn fail<E: ContextualError + std::fmt::Debug>(error: &E, context: &str) -> i32 {
    log_error_with_context(error, context);
    eprintln!("Error: {}", fatal_message(error, context));
    1
}
