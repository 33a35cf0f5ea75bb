//! Structured logging setup, adapted from the core library's
//! `tracing_kit.rs`: a stderr layer plus an optional daily-rotating file
//! layer, both filtered through `EnvFilter`. Unlike the library's pretty,
//! multi-line event format (meant for development), the CLI uses `compact`
//! — one line per event is friendlier piped into a terminal or log
//! aggregator.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Installs the process-wide subscriber. `default_directive` governs
/// verbosity when `RUST_LOG` is unset (e.g. `"info"` or
/// `"fastqtools=debug"`). `log_dir`, when given, adds a daily-rotating file
/// layer alongside stderr.
pub fn setup_logging(default_directive: &str, log_dir: Option<&Path>) -> Result<()> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_timer(ChronoLocal::rfc_3339())
        .with_target(false)
        .with_filter(env_filter(default_directive)?);

    match log_dir {
        Some(dir) => {
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("fastqtools")
                .filename_suffix("log")
                .build(dir)
                .with_context(|| format!("setting up rolling log file under {}", dir.display()))?;

            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_timer(ChronoLocal::rfc_3339())
                .with_writer(file_appender)
                .with_filter(env_filter(default_directive)?);

            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(file_layer)
                .try_init()
                .context("installing tracing subscriber")?;
        }
        None => {
            tracing_subscriber::registry()
                .with(stderr_layer)
                .try_init()
                .context("installing tracing subscriber")?;
        }
    }

    Ok(())
}

fn env_filter(default_directive: &str) -> Result<EnvFilter> {
    let directive = default_directive
        .parse()
        .with_context(|| format!("invalid log directive {default_directive:?}"))?;
    Ok(EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy())
}
