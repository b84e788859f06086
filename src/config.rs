//! Reporter and device settings.
//!
//! Every knob has a default that matches the behaviour of the deployed
//! devices. The binary additionally reads a few values from the environment.

use anyhow::{anyhow, Context};
use tokio::time::Duration;

use crate::battery_filter::{BatteryLevelFilter, HysteresisRule};
use crate::calibration::CalibrationProfile;
use crate::error::ConfigError;
use crate::uplink::{HexCase, WireEncoding};
use crate::velostat::LoadThresholds;

/// Settings for [`UplinkReporter`](crate::UplinkReporter)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReporterConfig {
    pub hysteresis_margin_percent: u8,
    pub hysteresis_rule: HysteresisRule,
    /// Levels at or below this are never sent
    pub low_battery_floor_percent: u8,
    /// Wait after the reset command before sending the frame
    pub reset_delay: Duration,
    /// Wait after the frame before the modem accepts another command
    pub post_send_delay: Duration,
    pub wire_encoding: WireEncoding,
    pub hex_case: HexCase,
}

impl ReporterConfig {
    pub const DEFAULT_LOW_BATTERY_FLOOR_PERCENT: u8 = 30;
    pub const DEFAULT_RESET_DELAY: Duration = Duration::from_millis(100);
    pub const DEFAULT_POST_SEND_DELAY: Duration = Duration::from_millis(3000);

    pub fn with_hysteresis(mut self, margin_percent: u8, rule: HysteresisRule) -> Self {
        self.hysteresis_margin_percent = margin_percent;
        self.hysteresis_rule = rule;
        self
    }

    pub fn with_low_battery_floor(mut self, percent: u8) -> Self {
        self.low_battery_floor_percent = percent;
        self
    }

    pub fn with_delays(mut self, reset_delay: Duration, post_send_delay: Duration) -> Self {
        self.reset_delay = reset_delay;
        self.post_send_delay = post_send_delay;
        self
    }

    pub fn with_wire_encoding(mut self, encoding: WireEncoding, case: HexCase) -> Self {
        self.wire_encoding = encoding;
        self.hex_case = case;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hysteresis_margin_percent > 100 {
            return Err(ConfigError::MarginOutOfRange(self.hysteresis_margin_percent));
        }
        if self.low_battery_floor_percent > 100 {
            return Err(ConfigError::FloorOutOfRange(self.low_battery_floor_percent));
        }
        Ok(())
    }
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            hysteresis_margin_percent: BatteryLevelFilter::DEFAULT_MARGIN_PERCENT,
            hysteresis_rule: HysteresisRule::default(),
            low_battery_floor_percent: Self::DEFAULT_LOW_BATTERY_FLOOR_PERCENT,
            reset_delay: Self::DEFAULT_RESET_DELAY,
            post_send_delay: Self::DEFAULT_POST_SEND_DELAY,
            wire_encoding: WireEncoding::default(),
            hex_case: HexCase::default(),
        }
    }
}

/// Everything the device loop needs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceConfig {
    pub report_interval: Duration,
    pub sample_period: Duration,
    pub calibration: CalibrationProfile,
    pub load_thresholds: LoadThresholds,
    pub reporter: ReporterConfig,
}

impl DeviceConfig {
    const REPORT_INTERVAL_VAR: &'static str = "REPORT_INTERVAL_MS";
    const SAMPLE_PERIOD_VAR: &'static str = "SAMPLE_PERIOD_MS";
    const CALIBRATION_VAR: &'static str = "CALIBRATION";

    const DEFAULT_REPORT_INTERVAL_MS: u64 = 60_000;
    const DEFAULT_SAMPLE_PERIOD_MS: u64 = 1_000;
    const DEFAULT_CALIBRATION: (f32, f32, f32) = (1000.0, 10000.0, 9.0);

    /// Read the device settings from the process environment
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the device settings from any key-value source. Missing keys
    /// take their defaults, malformed ones are an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let report_interval = match lookup(Self::REPORT_INTERVAL_VAR) {
            Some(v) => parse_millis(Self::REPORT_INTERVAL_VAR, &v)?,
            None => Duration::from_millis(Self::DEFAULT_REPORT_INTERVAL_MS),
        };
        let sample_period = match lookup(Self::SAMPLE_PERIOD_VAR) {
            Some(v) => parse_millis(Self::SAMPLE_PERIOD_VAR, &v)?,
            None => Duration::from_millis(Self::DEFAULT_SAMPLE_PERIOD_MS),
        };
        let (low, high, volts) = match lookup(Self::CALIBRATION_VAR) {
            Some(v) => parse_calibration(&v)?,
            None => Self::DEFAULT_CALIBRATION,
        };
        let calibration = CalibrationProfile::new(low, high, volts)?;

        let reporter = ReporterConfig::default();
        reporter.validate()?;

        Ok(Self {
            report_interval,
            sample_period,
            calibration,
            load_thresholds: LoadThresholds::default(),
            reporter,
        })
    }
}

fn parse_millis(key: &str, value: &str) -> anyhow::Result<Duration> {
    let millis: u64 = value
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a whole number of milliseconds, got {value:?}"))?;
    Ok(Duration::from_millis(millis))
}

/// Parses `low_ohms,high_ohms,volts`
fn parse_calibration(value: &str) -> anyhow::Result<(f32, f32, f32)> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("CALIBRATION must be three numbers, got {value:?}"))?;
    match parts[..] {
        [low, high, volts] => Ok((low, high, volts)),
        _ => Err(anyhow!("CALIBRATION must be low_ohms,high_ohms,volts, got {value:?}")),
    }
}

#[test]
fn test_defaults() {
    let config = ReporterConfig::default();
    assert_eq!(config.hysteresis_margin_percent, 5);
    assert_eq!(config.low_battery_floor_percent, 30);
    assert_eq!(config.reset_delay, Duration::from_millis(100));
    assert_eq!(config.post_send_delay, Duration::from_millis(3000));
    assert_eq!(config.wire_encoding, WireEncoding::Plain);
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_rejects_out_of_range() {
    let config = ReporterConfig::default().with_low_battery_floor(101);
    assert_eq!(config.validate(), Err(ConfigError::FloorOutOfRange(101)));
    let config = ReporterConfig::default().with_hysteresis(120, HysteresisRule::NearbyOnly);
    assert_eq!(config.validate(), Err(ConfigError::MarginOutOfRange(120)));
}

#[test]
fn test_device_config_defaults() {
    let config = DeviceConfig::from_lookup(|_| None).unwrap();
    assert_eq!(config.report_interval, Duration::from_millis(60_000));
    assert_eq!(config.calibration.max_raw_reading(), 167);
}

#[test]
fn test_device_config_from_lookup() {
    let config = DeviceConfig::from_lookup(|key| match key {
        "REPORT_INTERVAL_MS" => Some("1500".to_string()),
        "CALIBRATION" => Some("1000, 1000, 5".to_string()),
        _ => None,
    })
    .unwrap();
    assert_eq!(config.report_interval, Duration::from_millis(1500));
    // half of 5 V is half the ADC range
    assert_eq!(config.calibration.max_raw_reading(), 511);
}

#[test]
fn test_device_config_rejects_garbage() {
    assert!(DeviceConfig::from_lookup(|key| (key == "REPORT_INTERVAL_MS").then(|| "soon".to_string())).is_err());
    assert!(DeviceConfig::from_lookup(|key| (key == "CALIBRATION").then(|| "1,2".to_string())).is_err());
    assert!(DeviceConfig::from_lookup(|key| (key == "CALIBRATION").then(|| "0,2,3".to_string())).is_err());
}
