use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Log file of the feature extraction run
pub const EXTRACT_FEATURES_LOG: &str = "extract_features.log";

/// Log file of the hyperparameter search (and single trials)
pub const HYPERTUNING_LOG: &str = "hypertuning.log";

/// Install the console layer plus a per-subsystem file layer.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the process. File logging is skipped with a warning when
/// the log directory is not writable.
pub fn init_logging(
    log_dir: &Path,
    file_name: &str,
    config: &LoggingConfig,
) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},lobppo=debug", config.level)));

    // `tracing_appender::rolling::never` panics if it can't create the file,
    // so preflight writability first.
    let (file_layer, guard) = match preflight(log_dir) {
        Ok(()) => {
            let file_appender = tracing_appender::rolling::never(log_dir, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false) // No color codes in file
                .with_target(true);
            (Some(layer), Some(guard))
        }
        Err(e) => {
            eprintln!(
                "Warning: Could not write to log directory {} ({}), file logging disabled",
                log_dir.display(),
                e
            );
            (None, None)
        }
    };

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    let file_logging_enabled = file_layer.is_some();
    let result = if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer.json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer)
            .try_init()
    };

    if result.is_ok() && file_logging_enabled {
        eprintln!("Logging to: {}", log_dir.join(file_name).display());
    }

    guard
}

fn preflight(log_dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(log_dir)?;
    let test_path = log_dir.join(".lobppo_write_test");
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&test_path)?;
    let _ = std::fs::remove_file(&test_path);
    Ok(())
}

pub fn init_logging_simple() {
    // Minimal logging for CLI commands
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}
