//! Rendering of registry snapshots.
//!
//! The text layout is fixed; tools that scrape the console output depend
//! on it. Each report starts with an empty line and is framed by 50-column
//! borders:
//!
//! ```text
//!
//! ==================================================
//! BLUETOOTH DEVICES DETECTED
//! ==================================================
//! Total Devices Found: 1
//! --------------------------------------------------
//!
//! Device: Beacon
//! Address: AA:BB:CC:DD:EE:FF
//! Signal Strength (RSSI): -58 dBm
//! Last Seen: 2024-05-01 12:00:00
//! Additional Info:
//!   company: Acme
//!
//! ==================================================
//! ```
//!
//! An empty registry ends the report right after `No devices found`.

use serde::Serialize;

use blescan_types::DeviceObservation;

use crate::error::Result;

/// Width of the report borders.
pub const BORDER_WIDTH: usize = 50;

/// Output format for scan reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// Human-readable framed report.
    #[default]
    Text,
    /// One JSON object per report, on a single line.
    Json,
}

impl ReportFormat {
    /// Render a snapshot in this format.
    pub fn render(self, devices: &[DeviceObservation]) -> Result<String> {
        match self {
            Self::Text => Ok(format_report(devices)),
            Self::Json => format_report_json(devices),
        }
    }
}

/// Render a snapshot as the framed text report.
#[must_use]
pub fn format_report(devices: &[DeviceObservation]) -> String {
    let heavy = "=".repeat(BORDER_WIDTH);
    let light = "-".repeat(BORDER_WIDTH);

    let mut output = String::new();
    output.push('\n');
    output.push_str(&format!("{}\n", heavy));
    output.push_str("BLUETOOTH DEVICES DETECTED\n");
    output.push_str(&format!("{}\n", heavy));
    output.push_str(&format!("Total Devices Found: {}\n", devices.len()));
    output.push_str(&format!("{}\n", light));

    if devices.is_empty() {
        output.push_str("No devices found\n");
        return output;
    }

    for device in devices {
        output.push('\n');
        output.push_str(&format_device(device));
    }

    output.push('\n');
    output.push_str(&format!("{}\n", heavy));
    output
}

fn format_device(device: &DeviceObservation) -> String {
    let rssi = match device.signal_strength {
        Some(rssi) => format!("{} dBm", rssi),
        None => "N/A".to_string(),
    };

    let mut output = String::new();
    output.push_str(&format!("Device: {}\n", device.name));
    output.push_str(&format!("Address: {}\n", device.address));
    output.push_str(&format!("Signal Strength (RSSI): {}\n", rssi));
    output.push_str(&format!("Last Seen: {}\n", device.last_seen_display()));

    if !device.metadata.is_empty() {
        output.push_str("Additional Info:\n");
        for (key, value) in &device.metadata {
            output.push_str(&format!("  {}: {}\n", key, value));
        }
    }
    output
}

/// Render a snapshot as a single JSON line.
pub fn format_report_json(devices: &[DeviceObservation]) -> Result<String> {
    #[derive(Serialize)]
    struct Report<'a> {
        total: usize,
        devices: &'a [DeviceObservation],
    }

    let mut line = serde_json::to_string(&Report {
        total: devices.len(),
        devices,
    })?;
    line.push('\n');
    Ok(line)
}
