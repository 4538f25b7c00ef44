//! pdmldb CLI entry point.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use pdmldb::cli::Args;
use pdmldb::pipeline;

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    let stats = pipeline::run(&args)?;

    eprintln!(
        "Loaded {} file(s): {} packets, {} rows written, {} skipped, {} values truncated",
        stats.files,
        stats.packets,
        stats.writer.rows_written,
        stats.writer.rows_skipped,
        stats.writer.truncated_values
    );
    Ok(())
}
