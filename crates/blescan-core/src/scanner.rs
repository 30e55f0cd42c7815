//! The periodic scan loop.
//!
//! A [`Scanner`] repeats one cycle until it is stopped:
//!
//! 1. **Discover** devices through the [`Discovery`] backend. A failure is
//!    reported inline and the cycle carries on with zero devices.
//! 2. **Merge** every discovered device into the [`DeviceRegistry`].
//! 3. **Report** the full registry snapshot to the output stream.
//! 4. **Wait** for the scan interval, unless a stop was requested.
//!
//! Stopping is cooperative. A [`StopHandle`] (typically triggered from a
//! Ctrl+C listener) prevents the next cycle from starting and cuts the wait
//! short, but never aborts a discovery call that is already running.
//!
//! # Example
//!
//! ```no_run
//! use blescan_core::{BleDiscovery, DeviceRegistry, ScanOptions, Scanner, ScannerOptions};
//!
//! # async fn example() -> blescan_core::Result<()> {
//! let scanner = Scanner::new(
//!     BleDiscovery::new(ScanOptions::default()),
//!     ScannerOptions::default().scan_interval_secs(10),
//! )?;
//!
//! let stop = scanner.stop_handle();
//! tokio::spawn(async move {
//!     let _ = tokio::signal::ctrl_c().await;
//!     stop.stop();
//! });
//!
//! let mut registry = DeviceRegistry::new();
//! let summary = scanner.run(&mut registry, &mut std::io::stdout()).await?;
//! println!("{} devices seen in {} cycles", summary.devices, summary.cycles);
//! # Ok(())
//! # }
//! ```

use std::io::Write;
use std::time::Duration;

use time::{OffsetDateTime, UtcOffset};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use blescan_types::DeviceObservation;

use crate::error::{Error, Result};
use crate::registry::DeviceRegistry;
use crate::report::ReportFormat;
use crate::traits::Discovery;

/// Default time between the end of one cycle and the start of the next.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(5);

/// Options for the scan loop.
#[derive(Debug, Clone)]
pub struct ScannerOptions {
    /// Wait between cycles.
    pub scan_interval: Duration,
    /// Stop after this many cycles (`None` = run until stopped).
    pub max_cycles: Option<u32>,
    /// How each snapshot is rendered.
    pub format: ReportFormat,
    /// Offset applied to `last_seen` timestamps.
    pub utc_offset: UtcOffset,
}

impl Default for ScannerOptions {
    fn default() -> Self {
        Self {
            scan_interval: DEFAULT_SCAN_INTERVAL,
            max_cycles: None,
            format: ReportFormat::Text,
            utc_offset: UtcOffset::UTC,
        }
    }
}

impl ScannerOptions {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the wait between cycles.
    pub fn scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    /// Set the wait between cycles in seconds.
    pub fn scan_interval_secs(mut self, secs: u64) -> Self {
        self.scan_interval = Duration::from_secs(secs);
        self
    }

    /// Stop after `cycles` cycles.
    pub fn max_cycles(mut self, cycles: u32) -> Self {
        self.max_cycles = Some(cycles);
        self
    }

    /// Set the report format.
    pub fn format(mut self, format: ReportFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the offset used for `last_seen` timestamps.
    pub fn utc_offset(mut self, offset: UtcOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    /// Reject option combinations the loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.scan_interval.is_zero() {
            return Err(Error::invalid_config("scan interval must be greater than zero"));
        }
        if self.max_cycles == Some(0) {
            return Err(Error::invalid_config("cycle count must be at least 1"));
        }
        Ok(())
    }
}

/// Requests a running [`Scanner`] to stop.
///
/// Cloning the handle shares the same stop flag.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    /// Ask the scanner to stop after the current cycle.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Whether a stop has been requested.
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Why the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A stop was requested.
    Stopped,
    /// The configured cycle count was reached.
    CycleLimit,
}

/// Result of a single cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleOutcome {
    /// Devices merged into the registry this cycle.
    pub discovered: usize,
    /// Whether the discovery call failed.
    pub failed: bool,
}

/// Totals for a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Cycles completed.
    pub cycles: u32,
    /// Cycles whose discovery call failed.
    pub failed_cycles: u32,
    /// Distinct devices in the registry at exit.
    pub devices: usize,
    /// Why the loop ended.
    pub reason: StopReason,
}

/// Drives the discover, merge, report, wait cycle.
pub struct Scanner<D> {
    discovery: D,
    options: ScannerOptions,
    stop: StopHandle,
}

impl<D: std::fmt::Debug> std::fmt::Debug for Scanner<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("discovery", &self.discovery)
            .field("options", &self.options)
            .field("stopped", &self.stop.is_stopped())
            .finish()
    }
}

impl<D: Discovery> Scanner<D> {
    /// Create a scanner. Fails if the options do not validate.
    pub fn new(discovery: D, options: ScannerOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            discovery,
            options,
            stop: StopHandle::default(),
        })
    }

    /// The discovery backend.
    pub fn discovery(&self) -> &D {
        &self.discovery
    }

    /// The loop options.
    pub fn options(&self) -> &ScannerOptions {
        &self.options
    }

    /// A handle that can stop this scanner from another task.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Request a stop. The cycle in progress, if any, still completes.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Whether the loop may start another cycle.
    pub fn is_running(&self) -> bool {
        !self.stop.is_stopped()
    }

    /// Run cycles until stopped or the cycle limit is reached.
    ///
    /// The discovery backend is closed on every exit path. Only failures
    /// writing to `out` end the loop with an error.
    pub async fn run<W: Write>(
        &self,
        registry: &mut DeviceRegistry,
        out: &mut W,
    ) -> Result<RunSummary> {
        let result = self.run_until_stopped(registry, out).await;

        if let Err(e) = self.discovery.close().await {
            warn!("Failed to release discovery backend: {}", e);
        }
        result
    }

    async fn run_until_stopped<W: Write>(
        &self,
        registry: &mut DeviceRegistry,
        out: &mut W,
    ) -> Result<RunSummary> {
        writeln!(out, "Starting Bluetooth Scanner...")?;
        writeln!(out, "Press Ctrl+C to stop")?;
        out.flush()?;

        info!(
            "Scanning every {}s",
            self.options.scan_interval.as_secs_f64()
        );

        let mut cycles: u32 = 0;
        let mut failed_cycles: u32 = 0;

        let reason = loop {
            if self.stop.is_stopped() {
                break StopReason::Stopped;
            }

            let outcome = self.run_cycle(registry, out).await?;
            cycles += 1;
            if outcome.failed {
                failed_cycles += 1;
            }

            if let Some(max) = self.options.max_cycles
                && cycles >= max
            {
                break StopReason::CycleLimit;
            }
            if self.stop.is_stopped() {
                break StopReason::Stopped;
            }

            let interrupted = tokio::select! {
                _ = self.stop.token.cancelled() => true,
                _ = sleep(self.options.scan_interval) => false,
            };
            if interrupted {
                break StopReason::Stopped;
            }
        };

        match reason {
            StopReason::Stopped => writeln!(out, "\nStopping Bluetooth Scanner...")?,
            StopReason::CycleLimit => writeln!(out, "Completed {} scan cycle(s).", cycles)?,
        }
        out.flush()?;

        let summary = RunSummary {
            cycles,
            failed_cycles,
            devices: registry.count(),
            reason,
        };
        info!(
            "Scanner finished after {} cycle(s), {} device(s) seen",
            summary.cycles, summary.devices
        );
        Ok(summary)
    }

    /// Run one discover, merge, report cycle (no wait).
    pub async fn run_cycle<W: Write>(
        &self,
        registry: &mut DeviceRegistry,
        out: &mut W,
    ) -> Result<CycleOutcome> {
        let (devices, failed) = match self.discovery.discover().await {
            Ok(devices) => (devices, false),
            Err(e) => {
                if e.is_discovery_error() {
                    warn!("Discovery failed: {}", e);
                } else {
                    error!("Unexpected discovery failure: {}", e);
                }
                writeln!(out, "Error during scanning: {}", e)?;
                (Vec::new(), true)
            }
        };

        let seen_at = self.now();
        let mut discovered = 0;
        for device in devices {
            if device.address.is_empty() {
                debug!("Skipping device without address: {:?}", device.name);
                continue;
            }
            registry.upsert(DeviceObservation::from_discovered(device, seen_at));
            discovered += 1;
        }
        debug!(
            "Merged {} device(s), registry holds {}",
            discovered,
            registry.count()
        );

        let report = self.options.format.render(registry.snapshot())?;
        out.write_all(report.as_bytes())?;
        out.flush()?;

        Ok(CycleOutcome { discovered, failed })
    }

    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc().to_offset(self.options.utc_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockDiscovery;
    use blescan_types::DiscoveredDevice;
    use std::io;
    use time::macros::offset;
    use tokio::time::Instant;

    fn device(address: &str, rssi: i16) -> DiscoveredDevice {
        DiscoveredDevice::new(address).with_rssi(rssi)
    }

    fn output(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdout closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_options_default() {
        let options = ScannerOptions::default();
        assert_eq!(options.scan_interval, Duration::from_secs(5));
        assert_eq!(options.max_cycles, None);
        assert_eq!(options.format, ReportFormat::Text);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_reject_zero_interval() {
        let result = Scanner::new(
            MockDiscovery::new(),
            ScannerOptions::new().scan_interval_secs(0),
        );
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_options_reject_zero_cycles() {
        let err = ScannerOptions::new().max_cycles(0).validate().unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn test_stop_handle_shares_state() {
        let scanner = Scanner::new(MockDiscovery::new(), ScannerOptions::default()).unwrap();
        let handle = scanner.stop_handle();
        assert!(scanner.is_running());
        handle.clone().stop();
        assert!(handle.is_stopped());
        assert!(!scanner.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cumulative_retention_across_cycles() {
        let mock = MockDiscovery::new()
            .then_devices(vec![device("A", -60), device("B", -70)])
            .then_devices(vec![device("A", -40)]);
        let scanner = Scanner::new(mock, ScannerOptions::new().max_cycles(2)).unwrap();
        let mut registry = DeviceRegistry::new();
        let mut out = Vec::new();

        let summary = scanner.run(&mut registry, &mut out).await.unwrap();

        assert_eq!(summary.cycles, 2);
        assert_eq!(summary.reason, StopReason::CycleLimit);
        assert_eq!(registry.count(), 2);
        assert_eq!(registry.get("A").unwrap().signal_strength, Some(-40));
        assert_eq!(registry.get("B").unwrap().signal_strength, Some(-70));
        assert!(registry.get("B").unwrap().last_seen <= registry.get("A").unwrap().last_seen);

        let text = output(out);
        assert_eq!(text.matches("Total Devices Found: 2").count(), 2);
        assert!(text.ends_with("Completed 2 scan cycle(s).\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_failure_does_not_end_loop() {
        let mock = MockDiscovery::new()
            .then_devices(vec![device("A", -55)])
            .then_error(Error::discovery("adapter busy"))
            .then_devices(vec![device("B", -65)]);
        let scanner = Scanner::new(mock, ScannerOptions::new().max_cycles(3)).unwrap();
        let mut registry = DeviceRegistry::new();
        let mut out = Vec::new();

        let summary = scanner.run(&mut registry, &mut out).await.unwrap();

        assert_eq!(summary.cycles, 3);
        assert_eq!(summary.failed_cycles, 1);
        assert_eq!(scanner.discovery().call_count(), 3);
        assert_eq!(registry.count(), 2);

        let text = output(out);
        assert!(text.contains("Error during scanning: Discovery failed: adapter busy\n"));
        // The failed cycle still reports the existing registry.
        let after_error = text
            .split("Error during scanning")
            .nth(1)
            .unwrap();
        assert!(after_error.contains("Total Devices Found: 1"));
        assert!(after_error.contains("Address: A"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_on_first_cycle_reports_empty_registry() {
        let mock = MockDiscovery::new().then_error(Error::AdapterUnavailable);
        let scanner = Scanner::new(mock, ScannerOptions::new().max_cycles(1)).unwrap();
        let mut registry = DeviceRegistry::new();
        let mut out = Vec::new();

        scanner.run(&mut registry, &mut out).await.unwrap();

        let text = output(out);
        assert!(text.contains("Error during scanning: No Bluetooth adapter available"));
        assert!(text.contains("Total Devices Found: 0"));
        assert!(text.contains("No devices found"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_after_report_prevents_next_cycle() {
        let stop = StopHandle::default();
        let stop_in_hook = stop.clone();
        let mock = MockDiscovery::new()
            .with_fallback(vec![device("A", -50)])
            .on_discover(move |call| {
                if call == 1 {
                    stop_in_hook.stop();
                }
            });
        let mut scanner = Scanner::new(mock, ScannerOptions::default()).unwrap();
        scanner.stop = stop;
        let mut registry = DeviceRegistry::new();
        let mut out = Vec::new();

        let start = Instant::now();
        let summary = scanner.run(&mut registry, &mut out).await.unwrap();

        assert_eq!(summary.reason, StopReason::Stopped);
        assert_eq!(summary.cycles, 1);
        assert_eq!(scanner.discovery().call_count(), 1);
        // The cycle in progress completes, the wait is skipped.
        assert_eq!(registry.count(), 1);
        assert!(start.elapsed() < DEFAULT_SCAN_INTERVAL);

        let text = output(out);
        assert_eq!(text.matches("BLUETOOTH DEVICES DETECTED").count(), 1);
        assert!(text.ends_with("\nStopping Bluetooth Scanner...\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_wait_ends_wait_early() {
        let scanner = Scanner::new(
            MockDiscovery::new(),
            ScannerOptions::new().scan_interval_secs(60),
        )
        .unwrap();
        let handle = scanner.stop_handle();
        tokio::spawn(async move {
            sleep(Duration::from_secs(1)).await;
            handle.stop();
        });

        let mut registry = DeviceRegistry::new();
        let mut out = Vec::new();
        let start = Instant::now();
        let summary = scanner.run(&mut registry, &mut out).await.unwrap();

        assert_eq!(summary.reason, StopReason::Stopped);
        assert_eq!(summary.cycles, 1);
        assert!(start.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_scan_interval_between_cycles() {
        let scanner = Scanner::new(
            MockDiscovery::new(),
            ScannerOptions::new().scan_interval_secs(7).max_cycles(3),
        )
        .unwrap();
        let mut registry = DeviceRegistry::new();
        let mut out = Vec::new();

        let start = Instant::now();
        scanner.run(&mut registry, &mut out).await.unwrap();
        let elapsed = start.elapsed();

        // Two waits between three cycles; none after the last one.
        assert!(elapsed >= Duration::from_secs(14));
        assert!(elapsed < Duration::from_secs(21));
    }

    #[tokio::test]
    async fn test_already_stopped_runs_no_cycle() {
        let scanner = Scanner::new(MockDiscovery::new(), ScannerOptions::default()).unwrap();
        scanner.stop();
        let mut registry = DeviceRegistry::new();
        let mut out = Vec::new();

        let summary = scanner.run(&mut registry, &mut out).await.unwrap();

        assert_eq!(summary.cycles, 0);
        assert_eq!(scanner.discovery().call_count(), 0);
        assert_eq!(
            output(out),
            "Starting Bluetooth Scanner...\nPress Ctrl+C to stop\n\nStopping Bluetooth Scanner...\n"
        );
    }

    #[tokio::test]
    async fn test_discovery_closed_on_exit() {
        let scanner =
            Scanner::new(MockDiscovery::new(), ScannerOptions::new().max_cycles(1)).unwrap();
        let mut registry = DeviceRegistry::new();
        scanner.run(&mut registry, &mut Vec::new()).await.unwrap();
        assert!(scanner.discovery().is_closed());
    }

    #[tokio::test]
    async fn test_output_failure_is_fatal_and_still_closes() {
        let scanner = Scanner::new(MockDiscovery::new(), ScannerOptions::default()).unwrap();
        let mut registry = DeviceRegistry::new();

        let err = scanner.run(&mut registry, &mut BrokenPipe).await.unwrap_err();

        assert!(matches!(err, Error::Io(_)));
        assert!(scanner.discovery().is_closed());
        assert_eq!(scanner.discovery().call_count(), 0);
    }

    #[tokio::test]
    async fn test_cycle_defaults_missing_name() {
        let mock = MockDiscovery::new().then_devices(vec![device("AA:BB:CC:DD:EE:FF", -60)]);
        let scanner = Scanner::new(mock, ScannerOptions::default()).unwrap();
        let mut registry = DeviceRegistry::new();
        let mut out = Vec::new();

        let outcome = scanner.run_cycle(&mut registry, &mut out).await.unwrap();

        assert_eq!(outcome, CycleOutcome { discovered: 1, failed: false });
        assert_eq!(registry.get("AA:BB:CC:DD:EE:FF").unwrap().name, "Unknown");
        assert!(output(out).contains("Device: Unknown\n"));
    }

    #[tokio::test]
    async fn test_cycle_reports_metadata() {
        let mock = MockDiscovery::new().then_devices(vec![
            DiscoveredDevice::new("A")
                .with_name("Tag")
                .with_rssi(-70)
                .with_metadata("company", "Acme"),
            DiscoveredDevice::new("B").with_rssi(-80),
        ]);
        let scanner = Scanner::new(mock, ScannerOptions::default()).unwrap();
        let mut registry = DeviceRegistry::new();
        let mut out = Vec::new();

        scanner.run_cycle(&mut registry, &mut out).await.unwrap();

        let text = output(out);
        assert!(text.contains("Additional Info:\n  company: Acme\n"));
        assert_eq!(text.matches("Additional Info:").count(), 1);
    }

    #[tokio::test]
    async fn test_cycle_skips_empty_address() {
        let mock = MockDiscovery::new().then_devices(vec![
            DiscoveredDevice::new("").with_name("Ghost"),
            device("A", -60),
        ]);
        let scanner = Scanner::new(mock, ScannerOptions::default()).unwrap();
        let mut registry = DeviceRegistry::new();

        let outcome = scanner.run_cycle(&mut registry, &mut Vec::new()).await.unwrap();

        assert_eq!(outcome.discovered, 1);
        assert_eq!(registry.count(), 1);
    }

    #[tokio::test]
    async fn test_last_seen_uses_configured_offset() {
        let mock = MockDiscovery::new().then_devices(vec![device("A", -60)]);
        let scanner = Scanner::new(
            mock,
            ScannerOptions::new().utc_offset(offset!(+2)),
        )
        .unwrap();
        let mut registry = DeviceRegistry::new();

        let before = OffsetDateTime::now_utc();
        scanner.run_cycle(&mut registry, &mut Vec::new()).await.unwrap();
        let after = OffsetDateTime::now_utc();

        let last_seen = registry.get("A").unwrap().last_seen;
        assert_eq!(last_seen.offset(), offset!(+2));
        assert!(last_seen >= before && last_seen <= after);
    }

    #[tokio::test]
    async fn test_json_cycle_output() {
        let mock = MockDiscovery::new().then_devices(vec![device("A", -60)]);
        let scanner = Scanner::new(
            mock,
            ScannerOptions::new().format(ReportFormat::Json),
        )
        .unwrap();
        let mut registry = DeviceRegistry::new();
        let mut out = Vec::new();

        scanner.run_cycle(&mut registry, &mut out).await.unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["total"], 1);
        assert_eq!(value["devices"][0]["address"], "A");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_limit_bounds_discovery_calls() {
        let scanner = Scanner::new(
            MockDiscovery::new().with_fallback(vec![device("A", -60)]),
            ScannerOptions::new().max_cycles(4),
        )
        .unwrap();
        let mut registry = DeviceRegistry::new();

        let summary = scanner.run(&mut registry, &mut Vec::new()).await.unwrap();

        assert_eq!(summary.cycles, 4);
        assert_eq!(summary.devices, 1);
        assert_eq!(scanner.discovery().call_count(), 4);
    }
}
