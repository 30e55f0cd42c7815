//! Device discovery over the platform Bluetooth stack.
//!
//! [`BleDiscovery`] implements [`Discovery`] on top of btleplug. Each call
//! runs one timed scan on the first available adapter and converts every
//! peripheral that advertised during that window into a [`DiscoveredDevice`].
//! Peripherals the stack still has cached from earlier scans are left out.

use std::collections::HashSet;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, Manager as _, Peripheral as _, PeripheralProperties, ScanFilter,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use blescan_types::{DiscoveredDevice, Metadata, MetadataValue};

use crate::error::{Error, Result};
use crate::traits::Discovery;
use crate::util::create_identifier;

/// Extra time allowed on top of the scan window before a discovery pass is
/// considered hung.
const STACK_GRACE: Duration = Duration::from_secs(10);

/// Bound on the clean-up `stop_scan` after a discovery pass timed out.
const STOP_GRACE: Duration = Duration::from_secs(2);

/// Options for each discovery pass.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// How long to listen for advertisements.
    pub duration: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(5),
        }
    }
}

impl ScanOptions {
    /// Create new scan options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scan duration.
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set scan duration in seconds.
    pub fn duration_secs(mut self, secs: u64) -> Self {
        self.duration = Duration::from_secs(secs);
        self
    }

    /// Check the options before a scanner is built from them.
    pub fn validate(&self) -> Result<()> {
        if self.duration.is_zero() {
            return Err(Error::invalid_config("scan duration must be greater than zero"));
        }
        Ok(())
    }

    /// Upper bound for a whole discovery pass.
    fn deadline(&self) -> Duration {
        self.duration + STACK_GRACE
    }
}

/// Get the first available Bluetooth adapter.
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    adapters.into_iter().next().ok_or(Error::AdapterUnavailable)
}

/// Discovery backed by the platform Bluetooth stack.
///
/// The adapter is acquired on the first scan and kept for later ones. After
/// a failed scan it is dropped and acquired again on the next call, so an
/// adapter that was unplugged or powered off can come back.
pub struct BleDiscovery {
    options: ScanOptions,
    adapter: Mutex<Option<Adapter>>,
}

impl std::fmt::Debug for BleDiscovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleDiscovery")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl BleDiscovery {
    /// Create a discovery backend. No adapter is opened until the first scan.
    pub fn new(options: ScanOptions) -> Self {
        Self {
            options,
            adapter: Mutex::new(None),
        }
    }

    /// The options used for each scan.
    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    async fn adapter(&self) -> Result<Adapter> {
        let mut slot = self.adapter.lock().await;
        if let Some(adapter) = slot.as_ref() {
            return Ok(adapter.clone());
        }
        let adapter = get_adapter().await?;
        debug!("Acquired Bluetooth adapter");
        *slot = Some(adapter.clone());
        Ok(adapter)
    }

    async fn release_adapter(&self) {
        if self.adapter.lock().await.take().is_some() {
            debug!("Released Bluetooth adapter");
        }
    }
}

#[async_trait]
impl Discovery for BleDiscovery {
    async fn discover(&self) -> Result<Vec<DiscoveredDevice>> {
        let adapter = self.adapter().await?;
        let deadline = self.options.deadline();

        let outcome = with_deadline(
            "discover",
            deadline,
            scan_with_adapter(&adapter, &self.options),
            async {
                match timeout(STOP_GRACE, adapter.stop_scan()).await {
                    Ok(Ok(())) => debug!("Stopped scan after timeout"),
                    Ok(Err(e)) => warn!("Failed to stop scan after timeout: {}", e),
                    Err(_) => warn!("Timed out stopping scan"),
                }
            },
        )
        .await;

        if outcome.is_err() {
            self.release_adapter().await;
        }
        outcome
    }

    async fn close(&self) -> Result<()> {
        self.release_adapter().await;
        Ok(())
    }
}

/// Scan for devices using a specific adapter.
pub async fn scan_with_adapter(
    adapter: &Adapter,
    options: &ScanOptions,
) -> Result<Vec<DiscoveredDevice>> {
    info!(
        "Starting BLE scan for {} seconds...",
        options.duration.as_secs()
    );

    // Subscribe first so no advertisement of this window is missed.
    let mut events = adapter.events().await?;
    adapter.start_scan(ScanFilter::default()).await?;

    let mut seen = HashSet::new();
    let window = sleep(options.duration);
    tokio::pin!(window);
    loop {
        tokio::select! {
            _ = &mut window => break,
            event = events.next() => match event {
                Some(event) => {
                    if let Some(id) = advertising_peripheral(event) {
                        seen.insert(id);
                    }
                }
                None => {
                    debug!("Adapter event stream ended early");
                    (&mut window).await;
                    break;
                }
            },
        }
    }
    adapter.stop_scan().await?;

    let known = adapter.peripherals().await?;
    let total = known.len();
    let peripherals = seen_this_window(known, &seen, |p| p.id());
    debug!(
        "{} of {} known peripheral(s) advertised during the scan",
        peripherals.len(),
        total
    );

    let mut discovered = Vec::with_capacity(peripherals.len());

    for peripheral in peripherals {
        match process_peripheral(&peripheral).await {
            Ok(Some(device)) => {
                debug!("Found device {} ({:?})", device.address, device.name);
                discovered.push(device);
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Error reading peripheral properties: {}", e);
            }
        }
    }

    info!("Scan complete. Found {} device(s)", discovered.len());
    Ok(discovered)
}

/// The peripheral an adapter event shows to be advertising, if any.
fn advertising_peripheral(event: CentralEvent) -> Option<PeripheralId> {
    match event {
        CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => Some(id),
        CentralEvent::ManufacturerDataAdvertisement { id, .. }
        | CentralEvent::ServiceDataAdvertisement { id, .. }
        | CentralEvent::ServicesAdvertisement { id, .. } => Some(id),
        _ => None,
    }
}

/// Keep the items whose key was seen, preserving their order.
fn seen_this_window<T, K, F>(items: Vec<T>, seen: &HashSet<K>, key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    items
        .into_iter()
        .filter(|item| seen.contains(&key(item)))
        .collect()
}

/// Await `scan` for at most `deadline`. On timeout, `cleanup` runs before
/// the timeout error is returned.
async fn with_deadline<T, S, C>(
    operation: &'static str,
    deadline: Duration,
    scan: S,
    cleanup: C,
) -> Result<T>
where
    S: Future<Output = Result<T>>,
    C: Future<Output = ()>,
{
    match timeout(deadline, scan).await {
        Ok(result) => result,
        Err(_) => {
            cleanup.await;
            Err(Error::timeout(operation, deadline))
        }
    }
}

async fn process_peripheral(peripheral: &Peripheral) -> Result<Option<DiscoveredDevice>> {
    let Some(properties) = peripheral.properties().await? else {
        return Ok(None);
    };

    let address = create_identifier(&properties.address.to_string(), &peripheral.id());
    let metadata = advertisement_metadata(&properties);

    Ok(Some(DiscoveredDevice {
        address,
        name: properties.local_name,
        rssi: properties.rssi,
        metadata,
    }))
}

/// Collect the advertisement fields of a peripheral as opaque metadata.
///
/// Keys:
/// - `tx_power`: advertised TX power level
/// - `address_type`: public or random
/// - `manufacturer_data.0xNNNN`: payload per company identifier
/// - `service_data.<uuid>`: payload per service
/// - `services`: advertised service UUIDs, comma-separated
pub fn advertisement_metadata(properties: &PeripheralProperties) -> Metadata {
    let mut metadata = Metadata::new();

    if let Some(tx_power) = properties.tx_power_level {
        metadata.insert("tx_power".to_string(), MetadataValue::Integer(tx_power.into()));
    }

    if let Some(address_type) = &properties.address_type {
        metadata.insert(
            "address_type".to_string(),
            MetadataValue::Text(format!("{:?}", address_type)),
        );
    }

    for (company_id, payload) in &properties.manufacturer_data {
        metadata.insert(
            format!("manufacturer_data.0x{:04X}", company_id),
            MetadataValue::Bytes(payload.clone()),
        );
    }

    for (uuid, payload) in &properties.service_data {
        metadata.insert(
            format!("service_data.{}", uuid),
            MetadataValue::Bytes(payload.clone()),
        );
    }

    if !properties.services.is_empty() {
        let services = properties
            .services
            .iter()
            .map(|uuid| uuid.to_string())
            .collect::<Vec<_>>()
            .join(",");
        metadata.insert("services".to_string(), MetadataValue::Text(services));
    }

    metadata
}
