// Tree Sync
// Command line entry point: parse arguments, pick a sink, run the reconciler

// MODULES ------------------>>

mod cli;

//--------------------------------------------------------<<
// IMPORTS ------------------>>

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use tracing_subscriber::EnvFilter;

use cli::Cli;
use tree_sync::operations::validate_trees;
use tree_sync::{reconcile, ExecuteSink, RecordSink, Settings, SyncConfig, SyncMode};

//--------------------------------------------------------<<

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = match &cli.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings: {}", path.display()))?,
        None => Settings::default(),
    };

    let threshold = settings
        .resolve_threshold(cli.size.as_deref())
        .context("Invalid --size")?;
    let mode = if cli.script {
        SyncMode::RecordOnly
    } else {
        SyncMode::Execute
    };

    let config = SyncConfig::new(&cli.master, &cli.slave, &cli.bin)?
        .with_threshold(threshold)
        .with_mode(mode);
    tracing::debug!(?config, "resolved configuration");

    // Fail on bad roots before creating the log file
    validate_trees(&config)?;

    let out: Box<dyn Write> = match &cli.file {
        Some(path) => Box::new(BufWriter::new(File::create(path).with_context(|| {
            format!("Failed to create log file: {}", path.display())
        })?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let report = match mode {
        SyncMode::Execute => {
            let mut sink = ExecuteSink::new(out);
            reconcile(&config, &mut sink)?
        }
        SyncMode::RecordOnly => {
            let mut sink = RecordSink::script(out, &settings.shebang())?;
            reconcile(&config, &mut sink)?
        }
    };

    if report.is_noop() {
        tracing::info!("slave already up to date");
    }

    Ok(())
}

/// Diagnostics go to stderr so stdout stays a clean operation log
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}
