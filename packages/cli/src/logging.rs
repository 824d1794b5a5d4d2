//! Tracing setup.
//!
//! Interactive commands log to stderr, quiet by default. Worker processes
//! have no terminal, so they append to `worker.log` in the data directory,
//! which `queuectl logs` reads back.

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::Context as _;
use tracing_subscriber::EnvFilter;

use crate::context::Context;

/// Environment variable holding the tracing filter.
pub const LOG_ENV: &str = "QUEUECTL_LOG";

fn filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default))
}

pub fn init_cli() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(filter("warn"))
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}

pub fn init_worker(ctx: &Context) -> anyhow::Result<()> {
    ctx.ensure_data_dir()?;
    let path = ctx.log_path();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter("info"))
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}
