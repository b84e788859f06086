//! Report the battery level of a velostat field sensor over a Sigfox-style AT-command modem
//!
//! The device measures its battery through a voltage divider, debounces the
//! percentage, and every so often sends it to the backend as a single byte.
//! Uplinks are tiny and unacknowledged, so the work here is in deciding what
//! to send and framing it exactly as the modem expects:
//!
//! - `AT$RC` to ready the modem, then a short settle delay
//! - `AT$SF=` plus two hex digits of the level, then a longer settle delay
//!
//! Nothing is sent while the battery is at or below 30%, and at most one
//! attempt is made per report interval.
//!
//! The same board reads a velostat sheet to detect load, see [`velostat`].
//!
//! # Example
//!
//! ```rust,no_run
//! # #[tokio::main(flavor = "current_thread")]
//! # pub async fn main() -> anyhow::Result<()> {
//!     use batteryuplink::{BatteryPercentage, ReporterConfig, SerialTransport, UplinkReporter};
//!
//!     let transport = SerialTransport::new(tokio::io::stdout());
//!     let mut reporter = UplinkReporter::new(ReporterConfig::default(), transport)?;
//!     let outcome = reporter.maybe_send(0, 60_000, BatteryPercentage::new(75)?).await?;
//!     println!("{outcome:?}");
//! #   Ok(())
//! # }
//! ```

pub mod backend;
mod battery_filter;
mod calibration;
mod config;
mod error;
mod sensor;
pub mod uplink;
pub mod velostat;

pub use battery_filter::{BatteryLevelFilter, HysteresisRule};
pub use calibration::{BatteryPercentage, CalibrationProfile, RawSample, ADC_MAX, ADC_REFERENCE_VOLTS};
pub use config::{DeviceConfig, ReporterConfig};
pub use error::{ConfigError, DecodeError, SampleError};
pub use sensor::{AnalogSampler, BatteryGauge, ReplaySampler};
pub use uplink::{SendOutcome, SerialTransport, SkipReason, UplinkReporter, UplinkTransport};
