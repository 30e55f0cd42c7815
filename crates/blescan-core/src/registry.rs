//! Cumulative in-memory registry of observed devices.
//!
//! The registry keeps one [`DeviceObservation`] per address. Every scan
//! cycle replaces the entries it re-observes and leaves all other entries
//! alone, so the registry only ever grows or updates for the lifetime of
//! the process. Iteration follows first-insertion order.

use std::collections::HashMap;

use blescan_types::DeviceObservation;

/// Devices seen so far, keyed by address.
#[derive(Debug, Default, Clone)]
pub struct DeviceRegistry {
    entries: Vec<DeviceObservation>,
    index: HashMap<String, usize>,
}

impl DeviceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an observation, replacing any entry with the same address.
    ///
    /// The replacement is wholesale: no field of the previous observation
    /// survives. A replaced entry keeps its position in iteration order.
    /// Returns the previous observation, if there was one.
    pub fn upsert(&mut self, observation: DeviceObservation) -> Option<DeviceObservation> {
        debug_assert!(
            !observation.address.is_empty(),
            "device address must not be empty"
        );

        match self.index.get(&observation.address) {
            Some(&slot) => Some(std::mem::replace(&mut self.entries[slot], observation)),
            None => {
                self.index
                    .insert(observation.address.clone(), self.entries.len());
                self.entries.push(observation);
                None
            }
        }
    }

    /// Current entries in registry order.
    pub fn snapshot(&self) -> &[DeviceObservation] {
        &self.entries
    }

    /// Look up a single device.
    pub fn get(&self, address: &str) -> Option<&DeviceObservation> {
        self.index.get(address).map(|&slot| &self.entries[slot])
    }

    /// Number of distinct addresses held.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Whether no device has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
