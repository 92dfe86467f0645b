//! # wattchecker
//!
//! A Rust client library for REX-BTWATTCH style watt checkers, with a
//! Prometheus exporter on top.
//!
//! The library talks to the meter over a serial link (usually an RFCOMM
//! port), decodes its voltage, current and power readings, and throttles
//! polling so scrape traffic never floods the device.
//!
//! ## Quick Start
//!
//! ```no_run
//! use wattchecker::{SerialTransport, SessionConfig, Transport, WattChecker};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), wattchecker::Error> {
//!     let mut transport = SerialTransport::with_port("/dev/rfcomm0");
//!     transport.connect().await?;
//!
//!     let device = WattChecker::new("desk", transport, SessionConfig::default());
//!     device.initialize().await?;
//!
//!     let sample = device.collect().await;
//!     println!("{}", sample.reading());
//!
//!     device.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`protocol`] - Frames, checksum, command codes and measurement parsing
//! - [`transport`] - Byte stream abstraction, serial and scripted transports
//! - [`commands`] - Request/response exchange for each command
//! - [`session`] - Device session state machine and polling cache
//! - [`types`] - Decoded readings
//! - [`config`] - Exporter settings file
//! - [`exporter`] - Prometheus gauges and the `/metrics` endpoint

pub mod commands;
pub mod config;
pub mod error;
pub mod exporter;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use commands::CommandHandler;
pub use config::{DeviceConfig, Settings};
pub use error::{Error, FrameError, Result};
pub use exporter::Exporter;
pub use protocol::{Command, CommandCode, MeasurementMode, ResponseFrame};
pub use session::{Phase, Sample, SessionConfig, WattChecker};
pub use transport::{
    MockTransport, SerialTransport, Transport, read_exact, serial::SerialConfig, write_exact,
};
pub use types::{DeviceTimestamp, Reading};
