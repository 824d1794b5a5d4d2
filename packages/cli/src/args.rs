use std::path::PathBuf;

use clap::Parser;

use crate::commands::Command;

/// Durable background job queue
#[derive(Parser, Debug)]
#[command(name = "queuectl", version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the queue database, worker roster and worker log
    #[arg(long, global = true, env = "QUEUECTL_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}
