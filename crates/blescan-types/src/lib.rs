//! Platform-agnostic types for the blescan BLE device scanner.
//!
//! This crate holds the data model shared by the scanning library
//! (blescan-core) and the command-line front end: the raw record returned
//! by a discovery call, the observation kept in the registry, and the
//! opaque advertisement metadata carried alongside both.
//!
//! # Example
//!
//! ```
//! use blescan_types::{DeviceObservation, DiscoveredDevice, MetadataValue};
//! use time::OffsetDateTime;
//!
//! let device = DiscoveredDevice::new("AA:BB:CC:DD:EE:FF")
//!     .with_name("Beacon")
//!     .with_rssi(-58)
//!     .with_metadata("company", "Acme");
//!
//! let obs = DeviceObservation::from_discovered(device, OffsetDateTime::UNIX_EPOCH);
//! assert_eq!(obs.metadata["company"], MetadataValue::from("Acme"));
//! ```

pub mod types;

pub use types::{
    DeviceObservation, DiscoveredDevice, Metadata, MetadataValue, UNKNOWN_NAME, format_timestamp,
};
