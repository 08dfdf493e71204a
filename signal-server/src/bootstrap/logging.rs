//! Logging setup (ambient stack, not part of the signal-pipeline core):
//! `tracing` + `tracing-subscriber` to stdout, with an optional rotating
//! file appender per `LoggingConfig`. Mirrors the layered
//! env-filter-plus-fmt-layer setup used throughout the rest of the crate.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Installs the global `tracing` subscriber. Returns a guard that must be
/// kept alive for the process lifetime if file logging is enabled (dropping
/// it stops the non-blocking writer thread).
pub fn init(config: &LoggingConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(env_filter).with(tracing_subscriber::fmt::layer());

    if !config.enabled {
        registry.init();
        return None;
    }

    if let Err(err) = std::fs::create_dir_all(&config.directory) {
        eprintln!("failed to create log directory {}: {err}", config.directory);
        registry.init();
        return None;
    }

    let rotation = match config.rotation.as_str() {
        "hourly" => tracing_appender::rolling::hourly(&config.directory, &config.file_prefix),
        "never" => tracing_appender::rolling::never(&config.directory, &config.file_prefix),
        _ => tracing_appender::rolling::daily(&config.directory, &config.file_prefix),
    };
    let (non_blocking, guard) = tracing_appender::non_blocking(rotation);

    registry
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    tracing::info!(
        directory = %config.directory,
        prefix = %config.file_prefix,
        rotation = %config.rotation,
        "file logging enabled"
    );
    Some(guard)
}
