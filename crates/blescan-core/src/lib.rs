//! Periodic BLE device discovery with a cumulative device registry.
//!
//! This crate repeatedly asks the platform Bluetooth stack which Bluetooth
//! Low Energy devices are advertising nearby, folds each answer into a
//! [`DeviceRegistry`], and prints a snapshot of everything seen so far.
//!
//! # Features
//!
//! - **Discovery**: timed BLE scans through btleplug ([`BleDiscovery`])
//! - **Registry**: one entry per address, newest observation wins, entries
//!   are never evicted
//! - **Scan loop**: discover, merge, report, wait; survives scan failures
//! - **Reports**: fixed-layout text report or one JSON line per cycle
//! - **Testing**: scriptable [`MockDiscovery`] behind the [`Discovery`] trait
//!
//! # Platform Differences
//!
//! - **macOS**: CoreBluetooth hides MAC addresses, so devices are keyed by
//!   the peripheral UUID assigned by the OS.
//! - **Linux/Windows**: devices are keyed by their Bluetooth MAC address
//!   (e.g., `AA:BB:CC:DD:EE:FF`).
//!
//! # Quick Start
//!
//! ```no_run
//! use blescan_core::{BleDiscovery, DeviceRegistry, ScanOptions, Scanner, ScannerOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let discovery = BleDiscovery::new(ScanOptions::default());
//!     let scanner = Scanner::new(discovery, ScannerOptions::default().max_cycles(3))?;
//!
//!     let mut registry = DeviceRegistry::new();
//!     scanner.run(&mut registry, &mut std::io::stdout()).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod mock;
pub mod registry;
pub mod report;
pub mod scan;
pub mod scanner;
pub mod traits;
pub mod util;

// Re-export the data model
pub use blescan_types as types;

// Core exports
pub use error::{Error, Result};
pub use mock::MockDiscovery;
pub use registry::DeviceRegistry;
pub use report::{ReportFormat, format_report, format_report_json};
pub use scan::{BleDiscovery, ScanOptions, get_adapter};
pub use scanner::{
    CycleOutcome, DEFAULT_SCAN_INTERVAL, RunSummary, Scanner, ScannerOptions, StopHandle,
    StopReason,
};
pub use traits::Discovery;
pub use util::{create_identifier, format_peripheral_id};

pub use blescan_types::{DeviceObservation, DiscoveredDevice, Metadata, MetadataValue};
