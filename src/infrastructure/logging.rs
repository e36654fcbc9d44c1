//! Logging system initialization.
//!
//! Structured tracing to the console, with an optional non-blocking file
//! layer. Note this is diagnostics only; the durable record of what the
//! reconciler changed is the audit log, not these streams.

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry,
};

pub use crate::infrastructure::config::LoggingConfig;

// Keeps the non-blocking writer alive for the life of the process.
static LOG_GUARDS: Lazy<Mutex<Vec<non_blocking::WorkerGuard>>> =
    Lazy::new(|| Mutex::new(Vec::new()));

/// Initialize tracing from a [`LoggingConfig`]. `log_dir` is only used when
/// `file_output` is enabled.
pub fn init_logging(config: &LoggingConfig, log_dir: &Path) -> Result<()> {
    // RUST_LOG wins over the configured level; sqlx query logs stay quiet
    // unless trace is requested explicitly.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = EnvFilter::new(&config.level);
        if !config.level.eq_ignore_ascii_case("trace") {
            filter = filter
                .add_directive("sqlx::query=warn".parse().expect("static directive"))
                .add_directive("sqlx::sqlite=warn".parse().expect("static directive"));
        }
        filter
    });

    let registry = Registry::default().with(env_filter);
    let console_layer = fmt::Layer::new()
        .with_writer(std::io::stderr)
        .with_target(false);

    if config.file_output {
        std::fs::create_dir_all(log_dir)
            .map_err(|e| anyhow!("Failed to create log directory {log_dir:?}: {e}"))?;
        let file_appender = rolling::daily(log_dir, "reconciler.log");
        let (file_writer, guard) = non_blocking(file_appender);
        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow!("log guard mutex poisoned"))?
            .push(guard);

        let file_layer = fmt::Layer::new()
            .with_writer(file_writer)
            .with_target(false)
            .with_ansi(false);
        registry.with(console_layer).with(file_layer).init();
    } else {
        registry.with(console_layer).init();
    }

    info!(level = %config.level, file_output = config.file_output, "logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_console_only_info() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(!config.file_output);
    }
}
