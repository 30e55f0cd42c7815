//! Trait abstraction for BLE discovery backends.
//!
//! This module provides the [`Discovery`] trait that abstracts over the
//! real Bluetooth stack ([`crate::BleDiscovery`]) and the scripted mock
//! ([`crate::MockDiscovery`]) used in tests.

use async_trait::async_trait;

use blescan_types::DiscoveredDevice;

use crate::error::Result;

/// A source of "what is advertising right now" snapshots.
///
/// # Example
///
/// ```ignore
/// use blescan_core::{Discovery, Result};
///
/// async fn count_visible<D: Discovery>(discovery: &D) -> Result<usize> {
///     Ok(discovery.discover().await?.len())
/// }
/// ```
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Run one discovery pass and return the devices seen during it.
    ///
    /// Any error is transient from the caller's point of view: the scan loop
    /// reports it and tries again next cycle.
    async fn discover(&self) -> Result<Vec<DiscoveredDevice>>;

    /// Release any platform resources held by the backend.
    ///
    /// Called once when the scan loop exits. The default implementation does
    /// nothing.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
