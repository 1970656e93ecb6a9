//! Tracing initialization for adapter processes.
//!
//! Console layer is always installed; a daily-rotated file layer is added
//! when a logs directory is given. The returned guard must be held for the
//! life of the process or buffered file output is lost.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// File name prefix for rotated log files (wikimux.2026-08-05.log).
const LOG_PREFIX: &str = "wikimux";

/// Default logs directory under the user data dir.
pub fn default_logs_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("wikimux").join("logs"))
}

/// Initialize tracing with console output and an optional rolling file
/// layer. `RUST_LOG` takes precedence over the built-in defaults.
pub fn init_tracing(logs_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    // Rust crate names use underscores in tracing targets.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info")
            .add_directive("wikimux_core=debug".parse().unwrap())
            .add_directive("wikimux_gateway=debug".parse().unwrap())
            .add_directive("wikimux_mcp=debug".parse().unwrap())
    });

    // Console layer: colored, compact
    let console_layer = fmt::layer()
        .with_ansi(true)
        .compact()
        .with_thread_names(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true);

    match logs_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create logs directory {}", dir.display()))?;

            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(LOG_PREFIX)
                .filename_suffix("log")
                .build(dir)
                .context("Failed to create log file appender")?;
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

            // File layer: no colors, more detail
            let file_layer = fmt::layer()
                .with_writer(non_blocking_file)
                .with_ansi(false)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_file(true)
                .with_target(true);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .with(file_layer)
                .try_init()
                .context("Tracing subscriber already initialized")?;

            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .try_init()
                .context("Tracing subscriber already initialized")?;

            Ok(None)
        }
    }
}
