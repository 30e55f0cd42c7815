//! Command-line front end for the blescan BLE scanner.
//!
//! The binary lives in `main.rs`; this library exposes argument parsing and
//! configuration handling so they can be tested in isolation.

pub mod cli;
pub mod config;

pub use blescan_core;
