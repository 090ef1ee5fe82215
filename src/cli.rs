// Command Line
// Argument parsing using clap derive

use clap::Parser;
use std::path::PathBuf;
use tree_sync::core::config::compiled::DEFAULT_MAX_SIZE;

/// Update SLAVE to the current versions of files in MASTER, keeping old versions in BIN
#[derive(Parser, Debug)]
#[command(name = "tree-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Master directory with the current version of every file
    #[arg(value_name = "MASTER")]
    pub master: PathBuf,

    /// Slave directory, where files will be copied
    #[arg(value_name = "SLAVE")]
    pub slave: PathBuf,

    /// Rubbish bin for old versions of files
    #[arg(value_name = "BIN")]
    pub bin: PathBuf,

    /// Redirect the operation log to a file
    #[arg(short, long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    #[arg(
        short = 'm',
        long,
        value_name = "SIZE",
        help = format!(
            "Max file size to store in BIN, e.g. 500, 10MiB, 2GB [default: {DEFAULT_MAX_SIZE}]"
        )
    )]
    pub size: Option<String>,

    /// Only write a shell script, change nothing
    #[arg(short, long)]
    pub script: bool,

    /// YAML settings file (max_size, interpreter)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug diagnostics on stderr
    #[arg(short, long)]
    pub verbose: bool,
}
