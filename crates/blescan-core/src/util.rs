//! Utility functions for blescan-core.

use btleplug::platform::PeripheralId;

/// Address reported by platforms that do not expose the real MAC address.
pub const HIDDEN_ADDRESS: &str = "00:00:00:00:00:00";

/// Format a peripheral ID as a string.
///
/// On macOS, peripheral IDs are UUIDs. On other platforms they wrap the
/// Bluetooth address.
pub fn format_peripheral_id(id: &PeripheralId) -> String {
    format!("{:?}", id)
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .to_string()
}

/// Pick the registry key for a peripheral.
///
/// On macOS, where every address reads as [`HIDDEN_ADDRESS`], the peripheral
/// ID is used instead so that distinct devices do not collapse into one
/// registry entry.
pub fn create_identifier(address: &str, peripheral_id: &PeripheralId) -> String {
    resolve_identifier(address, || format_peripheral_id(peripheral_id))
}

fn resolve_identifier(address: &str, fallback: impl FnOnce() -> String) -> String {
    if address == HIDDEN_ADDRESS {
        fallback()
    } else {
        address.to_string()
    }
}
