use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use time::UtcOffset;
use tracing_subscriber::EnvFilter;

use blescan_cli::cli::Cli;
use blescan_cli::config::{Config, Settings};
use blescan_core::{BleDiscovery, DeviceRegistry, ScanOptions, Scanner, ScannerOptions};

fn main() -> Result<()> {
    // Must be read before any other thread exists.
    let utc_offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);

    let cli = Cli::parse();

    // Logs go to stderr so stdout carries only the report.
    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(run(cli, utc_offset))
}

async fn run(cli: Cli, utc_offset: UtcOffset) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };
    let settings = Settings::resolve(&cli, &config);
    tracing::debug!("Effective settings: {:?}", settings);

    let scan_options = ScanOptions::new().duration(settings.scan_duration);
    scan_options.validate().context("Invalid scan duration")?;

    let mut scanner_options = ScannerOptions::new()
        .scan_interval(settings.scan_interval)
        .format(settings.format)
        .utc_offset(utc_offset);
    if let Some(count) = settings.max_cycles {
        scanner_options = scanner_options.max_cycles(count);
    }

    let scanner = Scanner::new(BleDiscovery::new(scan_options), scanner_options)
        .context("Invalid scanner options")?;

    let stop = scanner.stop_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => stop.stop(),
            Err(e) => tracing::warn!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    let mut registry = DeviceRegistry::new();
    let mut stdout = io::stdout();
    let summary = scanner.run(&mut registry, &mut stdout).await?;

    tracing::debug!(
        "{} cycle(s), {} failed, {} device(s)",
        summary.cycles,
        summary.failed_cycles,
        summary.devices
    );
    Ok(())
}
