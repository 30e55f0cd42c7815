//! Example: One discovery pass
//!
//! Runs a single BLE scan and prints the standard device report.
//!
//! Run with: `cargo run --example scan_once`

use blescan_core::{BleDiscovery, DeviceRegistry, ScanOptions, Scanner, ScannerOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let discovery = BleDiscovery::new(ScanOptions::default().duration_secs(8));
    let scanner = Scanner::new(discovery, ScannerOptions::default().max_cycles(1))?;

    let mut registry = DeviceRegistry::new();
    let summary = scanner.run(&mut registry, &mut std::io::stdout()).await?;

    if summary.failed_cycles > 0 {
        println!();
        println!("The scan failed. Make sure:");
        println!("  - Bluetooth is enabled on this computer");
        println!("  - This process is allowed to use Bluetooth");
    }

    Ok(())
}
