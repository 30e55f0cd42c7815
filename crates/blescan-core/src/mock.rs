//! Mock discovery backend for testing.
//!
//! [`MockDiscovery`] implements [`Discovery`] without touching any Bluetooth
//! hardware. Each call to `discover()` pops the next scripted outcome; once
//! the script runs out it keeps returning a fixed fallback list.
//!
//! # Features
//!
//! - **Scripted outcomes**: queue device lists and failures per call
//! - **Latency simulation**: add an artificial delay to every scan
//! - **Hooks**: run a callback on each call (e.g. to stop the scanner)

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use blescan_types::DiscoveredDevice;

use crate::error::{Error, Result};
use crate::traits::Discovery;

type DiscoverHook = Box<dyn Fn(u32) + Send + Sync>;

/// A scriptable discovery backend.
///
/// # Example
///
/// ```
/// use blescan_core::{Discovery, Error, MockDiscovery};
/// use blescan_types::DiscoveredDevice;
///
/// #[tokio::main]
/// async fn main() {
///     let mock = MockDiscovery::new()
///         .then_devices(vec![DiscoveredDevice::new("AA:BB:CC:DD:EE:FF")])
///         .then_error(Error::AdapterUnavailable);
///
///     assert_eq!(mock.discover().await.unwrap().len(), 1);
///     assert!(mock.discover().await.is_err());
///     assert!(mock.discover().await.unwrap().is_empty());
///     assert_eq!(mock.call_count(), 3);
/// }
/// ```
pub struct MockDiscovery {
    script: Mutex<VecDeque<Result<Vec<DiscoveredDevice>>>>,
    fallback: Vec<DiscoveredDevice>,
    latency: Duration,
    hook: Option<DiscoverHook>,
    calls: AtomicU32,
    closed: AtomicBool,
}

impl std::fmt::Debug for MockDiscovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockDiscovery")
            .field("fallback", &self.fallback)
            .field("latency", &self.latency)
            .field("calls", &self.calls.load(Ordering::Relaxed))
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Default for MockDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDiscovery {
    /// Create a mock that finds nothing.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Vec::new(),
            latency: Duration::ZERO,
            hook: None,
            calls: AtomicU32::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Queue a successful scan result.
    pub fn then_devices(mut self, devices: Vec<DiscoveredDevice>) -> Self {
        self.script.get_mut().push_back(Ok(devices));
        self
    }

    /// Queue a failed scan.
    pub fn then_error(mut self, error: Error) -> Self {
        self.script.get_mut().push_back(Err(error));
        self
    }

    /// Devices returned once the script is exhausted.
    pub fn with_fallback(mut self, devices: Vec<DiscoveredDevice>) -> Self {
        self.fallback = devices;
        self
    }

    /// Delay every scan by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Run `hook` at the start of every call, with the 1-based call number.
    pub fn on_discover(mut self, hook: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// Number of times `discover()` has been called.
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Whether `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Discovery for MockDiscovery {
    async fn discover(&self) -> Result<Vec<DiscoveredDevice>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(hook) = &self.hook {
            hook(call);
        }

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match self.script.lock().await.pop_front() {
            Some(outcome) => outcome,
            None => Ok(self.fallback.clone()),
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
