//! CLI argument definitions using clap.

use std::path::PathBuf;

use blescan_core::ReportFormat;
use clap::{Parser, ValueEnum};

/// Output format for scan reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Framed human-readable report
    #[default]
    Text,
    /// One JSON object per scan cycle
    Json,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Text => ReportFormat::Text,
            OutputFormat::Json => ReportFormat::Json,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "blescan")]
#[command(author, version, about = "Continuously scan for nearby Bluetooth Low Energy devices", long_about = None)]
pub struct Cli {
    /// Seconds to wait between scans (overrides scan_interval_seconds in config)
    #[arg(short, long, env = "BLESCAN_SCAN_INTERVAL")]
    pub interval: Option<u64>,

    /// Seconds to listen for advertisements on each scan (overrides scan_duration_seconds)
    #[arg(short, long)]
    pub duration: Option<u64>,

    /// Stop after this many scans (default: run until Ctrl+C)
    #[arg(short = 'n', long)]
    pub count: Option<u32>,

    /// Report format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Config file to use instead of the default location
    #[arg(short, long, env = "BLESCAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_arguments() {
        let cli = Cli::try_parse_from(["blescan"]).unwrap();
        assert_eq!(cli.duration, None);
        assert_eq!(cli.count, None);
        assert_eq!(cli.format, OutputFormat::Text);
        assert!(!cli.verbose);
        assert!(!cli.quiet);
    }

    #[test]
    fn test_all_options() {
        let cli = Cli::try_parse_from([
            "blescan",
            "--interval",
            "10",
            "-d",
            "3",
            "-n",
            "2",
            "--format",
            "json",
            "--config",
            "/tmp/blescan.toml",
            "-v",
        ])
        .unwrap();
        assert_eq!(cli.interval, Some(10));
        assert_eq!(cli.duration, Some(3));
        assert_eq!(cli.count, Some(2));
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/blescan.toml")));
        assert!(cli.verbose);
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["blescan", "-v", "-q"]).is_err());
    }

    #[test]
    fn test_negative_interval_rejected() {
        assert!(Cli::try_parse_from(["blescan", "--interval", "-5"]).is_err());
    }

    #[test]
    fn test_output_format_maps_to_report_format() {
        assert_eq!(ReportFormat::from(OutputFormat::Text), ReportFormat::Text);
        assert_eq!(ReportFormat::from(OutputFormat::Json), ReportFormat::Json);
    }
}
