//! Core types for discovered BLE devices.

use core::fmt;
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::macros::format_description;

/// Name shown for devices that do not advertise one.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Advertisement metadata attached to a device.
///
/// Keys are ordered so that reports list them deterministically.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A single scalar value from a device advertisement.
///
/// Values are opaque to the scanner: they are copied from the Bluetooth
/// stack into the registry and printed, never interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum MetadataValue {
    /// Free-form text.
    Text(String),
    /// Signed integer (e.g. TX power level).
    Integer(i64),
    /// Boolean flag.
    Bool(bool),
    /// Raw bytes, printed as lowercase hex.
    Bytes(Vec<u8>),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Bytes(bytes) => {
                for b in bytes {
                    write!(f, "{:02x}", b)?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Vec<u8>> for MetadataValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

/// A device as reported by a single discovery call.
///
/// This is the raw record handed over by the Bluetooth stack; it becomes a
/// [`DeviceObservation`] once it is stamped with the scan time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DiscoveredDevice {
    /// Stable hardware identifier (MAC address, or platform peripheral ID
    /// where the MAC is hidden).
    pub address: String,
    /// Advertised local name, if any.
    pub name: Option<String>,
    /// Received signal strength in dBm, if reported.
    pub rssi: Option<i16>,
    /// Advertisement metadata.
    pub metadata: Metadata,
}

impl DiscoveredDevice {
    /// Create a record with just an address.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    /// Set the advertised name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the RSSI.
    pub fn with_rssi(mut self, rssi: i16) -> Self {
        self.rssi = Some(rssi);
        self
    }

    /// Add one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// The last known state of a device, as held by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DeviceObservation {
    /// Unique key of the device.
    pub address: String,
    /// Advertised name, or [`UNKNOWN_NAME`].
    pub name: String,
    /// RSSI from the most recent scan that saw this device.
    pub signal_strength: Option<i16>,
    /// Time of the scan cycle that produced this observation.
    #[cfg_attr(feature = "serde", serde(with = "time::serde::rfc3339"))]
    pub last_seen: OffsetDateTime,
    /// Advertisement metadata, passed through untouched.
    pub metadata: Metadata,
}

impl DeviceObservation {
    /// Stamp a discovered device with the time it was seen.
    ///
    /// A missing name becomes [`UNKNOWN_NAME`].
    ///
    /// # Examples
    ///
    /// ```
    /// use blescan_types::{DeviceObservation, DiscoveredDevice};
    /// use time::OffsetDateTime;
    ///
    /// let device = DiscoveredDevice::new("AA:BB:CC:DD:EE:FF").with_rssi(-60);
    /// let obs = DeviceObservation::from_discovered(device, OffsetDateTime::UNIX_EPOCH);
    /// assert_eq!(obs.name, "Unknown");
    /// assert_eq!(obs.signal_strength, Some(-60));
    /// ```
    #[must_use]
    pub fn from_discovered(device: DiscoveredDevice, seen_at: OffsetDateTime) -> Self {
        Self {
            address: device.address,
            name: device.name.unwrap_or_else(|| UNKNOWN_NAME.to_string()),
            signal_strength: device.rssi,
            last_seen: seen_at,
            metadata: device.metadata,
        }
    }

    /// `last_seen` rendered as `YYYY-MM-DD HH:MM:SS`.
    pub fn last_seen_display(&self) -> String {
        format_timestamp(self.last_seen)
    }
}

/// Format a timestamp at second precision as `YYYY-MM-DD HH:MM:SS`.
pub fn format_timestamp(ts: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    ts.format(format).unwrap_or_else(|_| ts.to_string())
}
