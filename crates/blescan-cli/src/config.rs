//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use blescan_core::ReportFormat;
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

/// Default seconds between scans.
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 5;

/// Default seconds to listen on each scan.
pub const DEFAULT_SCAN_DURATION_SECS: u64 = 5;

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Seconds to wait between scans
    #[serde(default = "default_scan_interval", alias = "scanIntervalSeconds")]
    pub scan_interval_seconds: u64,

    /// Seconds to listen for advertisements on each scan
    #[serde(default = "default_scan_duration", alias = "scanDurationSeconds")]
    pub scan_duration_seconds: u64,
}

fn default_scan_interval() -> u64 {
    DEFAULT_SCAN_INTERVAL_SECS
}

fn default_scan_duration() -> u64 {
    DEFAULT_SCAN_DURATION_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan_interval_seconds: default_scan_interval(),
            scan_duration_seconds: default_scan_duration(),
        }
    }
}

impl Config {
    /// Get the default config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("blescan")
            .join("config.toml")
    }

    /// Load config from the default path, or return defaults if it is
    /// missing or unreadable.
    pub fn load() -> Self {
        let path = Self::path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring config file: {:#}", e);
                Self::default()
            }
        }
    }

    /// Load config from an explicit path. A missing file is an error.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Parse config from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

/// Effective settings after merging command-line flags over the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Wait between scan cycles
    pub scan_interval: Duration,
    /// Listening window of each scan
    pub scan_duration: Duration,
    /// Stop after this many cycles, if set
    pub max_cycles: Option<u32>,
    /// Report format written to stdout
    pub format: ReportFormat,
}

impl Settings {
    /// Explicit flags win over config values.
    pub fn resolve(cli: &Cli, config: &Config) -> Self {
        Self {
            scan_interval: Duration::from_secs(
                cli.interval.unwrap_or(config.scan_interval_seconds),
            ),
            scan_duration: Duration::from_secs(
                cli.duration.unwrap_or(config.scan_duration_seconds),
            ),
            max_cycles: cli.count,
            format: cli.format.into(),
        }
    }
}
