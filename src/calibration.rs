//! Analog readings and the voltage divider that scales the battery into the ADC range.
//!
//! The ADC is 10-bit with a 5 V reference. The battery is measured through a
//! divider of two resistors, so the reading that corresponds to a full battery
//! is well below the top of the ADC range and has to be derived from the
//! resistor values and the nominal battery voltage.

use std::fmt;

use crate::error::{ConfigError, SampleError};

/// Highest value the 10-bit ADC produces
pub const ADC_MAX: u16 = 1023;

/// ADC reference voltage
pub const ADC_REFERENCE_VOLTS: f32 = 5.0;

/// One instantaneous analog read, in ADC counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RawSample(u16);

impl RawSample {
    /// Rejects anything the ADC could not have produced.
    pub fn new(value: u16) -> Result<Self, SampleError> {
        if value > ADC_MAX {
            return Err(SampleError::RawOutOfRange(value));
        }
        Ok(Self(value))
    }

    pub const fn value(self) -> u16 {
        self.0
    }

    /// The voltage at the pin, in the range [0, 5]
    pub fn volts(self) -> f32 {
        f32::from(self.0) * ADC_REFERENCE_VOLTS / f32::from(ADC_MAX)
    }
}

impl TryFrom<u16> for RawSample {
    type Error = SampleError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// A state of charge in whole percent, always within [0, 100]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BatteryPercentage(u8);

impl BatteryPercentage {
    pub const EMPTY: Self = Self(0);
    pub const FULL: Self = Self(100);

    /// Rejects values above 100.
    pub fn new(value: u8) -> Result<Self, SampleError> {
        if value > 100 {
            return Err(SampleError::PercentageOutOfRange(value));
        }
        Ok(Self(value))
    }

    /// Clamps into [0, 100]. Used for the output of the percentage mapping,
    /// which overshoots when the battery sits above its nominal voltage.
    pub fn saturating(value: i32) -> Self {
        Self(value.clamp(0, 100) as u8)
    }

    pub const fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for BatteryPercentage {
    type Error = SampleError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BatteryPercentage> for u8 {
    fn from(level: BatteryPercentage) -> Self {
        level.0
    }
}

impl fmt::Display for BatteryPercentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Per-device constants of the battery voltage divider.
///
/// `low_resistance_ohms` is the resistor to ground, `high_resistance_ohms`
/// the one to the battery's positive pole. The nominal supply voltage may be
/// the datasheet value or one measured with a multimeter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationProfile {
    low_resistance_ohms: f32,
    high_resistance_ohms: f32,
    nominal_supply_volts: f32,
    max_raw_reading: u16,
}

impl CalibrationProfile {
    pub fn new(
        low_resistance_ohms: f32,
        high_resistance_ohms: f32,
        nominal_supply_volts: f32,
    ) -> Result<Self, ConfigError> {
        for ohms in [low_resistance_ohms, high_resistance_ohms] {
            if !ohms.is_finite() || ohms <= 0.0 {
                return Err(ConfigError::InvalidResistance(ohms));
            }
        }
        if !nominal_supply_volts.is_finite() || nominal_supply_volts <= 0.0 {
            return Err(ConfigError::InvalidSupplyVoltage(nominal_supply_volts));
        }

        let divided_volts =
            low_resistance_ohms / (low_resistance_ohms + high_resistance_ohms) * nominal_supply_volts;
        // Truncates like the firmware does; `as` saturates above u16::MAX.
        let max_raw_reading = (divided_volts * (f32::from(ADC_MAX) / ADC_REFERENCE_VOLTS)) as u16;
        if max_raw_reading == 0 {
            return Err(ConfigError::ZeroFullScale);
        }
        if max_raw_reading > ADC_MAX {
            return Err(ConfigError::FullScaleAboveAdc(max_raw_reading));
        }

        Ok(Self {
            low_resistance_ohms,
            high_resistance_ohms,
            nominal_supply_volts,
            max_raw_reading,
        })
    }

    pub fn low_resistance_ohms(&self) -> f32 {
        self.low_resistance_ohms
    }

    pub fn high_resistance_ohms(&self) -> f32 {
        self.high_resistance_ohms
    }

    pub fn nominal_supply_volts(&self) -> f32 {
        self.nominal_supply_volts
    }

    /// The raw reading that corresponds to a 100% charged battery
    pub fn max_raw_reading(&self) -> u16 {
        self.max_raw_reading
    }

    /// `round(raw / max_raw_reading * 100)`, clamped to [0, 100]
    pub fn percentage(&self, raw: RawSample) -> BatteryPercentage {
        let ratio = f32::from(raw.value()) / f32::from(self.max_raw_reading);
        BatteryPercentage::saturating((ratio * 100.0).round() as i32)
    }

    /// Integer linear map of [0, max_raw_reading] onto [0, 100] that truncates
    /// instead of rounding, clamped to [0, 100].
    pub fn mapped_percentage(&self, raw: RawSample) -> BatteryPercentage {
        let scaled = i32::from(raw.value()) * 100 / i32::from(self.max_raw_reading);
        BatteryPercentage::saturating(scaled)
    }
}

#[test]
fn test_max_raw_reading_from_divider() {
    let profile = CalibrationProfile::new(1000.0, 10000.0, 9.0).unwrap();
    assert_eq!(profile.max_raw_reading(), 167);
}

#[test]
fn test_percentage_rounds_and_clamps() {
    let profile = CalibrationProfile::new(1000.0, 10000.0, 9.0).unwrap();
    let pct = |raw| profile.percentage(RawSample::new(raw).unwrap()).value();
    assert_eq!(pct(0), 0);
    assert_eq!(pct(83), 50);
    assert_eq!(pct(84), 50);
    assert_eq!(pct(167), 100);
    assert_eq!(pct(1023), 100);
}

#[test]
fn test_mapped_percentage_truncates() {
    let profile = CalibrationProfile::new(1000.0, 10000.0, 9.0).unwrap();
    let pct = |raw| profile.mapped_percentage(RawSample::new(raw).unwrap()).value();
    assert_eq!(pct(83), 49);
    assert_eq!(pct(84), 50);
    assert_eq!(pct(500), 100);
}

#[test]
fn test_invalid_profiles_rejected() {
    assert_eq!(
        CalibrationProfile::new(0.0, 10000.0, 9.0),
        Err(ConfigError::InvalidResistance(0.0))
    );
    assert_eq!(
        CalibrationProfile::new(1000.0, 10000.0, -1.0),
        Err(ConfigError::InvalidSupplyVoltage(-1.0))
    );
    assert_eq!(
        CalibrationProfile::new(1.0, 1_000_000.0, 1.0),
        Err(ConfigError::ZeroFullScale)
    );
    // 10 V at the pin is beyond the 5 V reference
    assert_eq!(
        CalibrationProfile::new(1000.0, 1000.0, 20.0),
        Err(ConfigError::FullScaleAboveAdc(2046))
    );
    assert_eq!(CalibrationProfile::new(1000.0, 1000.0, 10.0).unwrap().max_raw_reading(), 1023);
}

#[test]
fn test_raw_sample_range() {
    assert!(RawSample::new(1023).is_ok());
    assert_eq!(RawSample::new(1024), Err(SampleError::RawOutOfRange(1024)));
    assert!((RawSample::new(1023).unwrap().volts() - 5.0).abs() < 1e-6);
    assert_eq!(RawSample::new(0).unwrap().volts(), 0.0);
}

#[test]
fn test_battery_percentage_range() {
    assert_eq!(BatteryPercentage::new(101), Err(SampleError::PercentageOutOfRange(101)));
    assert_eq!(BatteryPercentage::saturating(-4), BatteryPercentage::EMPTY);
    assert_eq!(BatteryPercentage::saturating(250), BatteryPercentage::FULL);
    assert_eq!(BatteryPercentage::new(42).unwrap().to_string(), "42%");
}
