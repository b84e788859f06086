use thiserror::Error;

/// A reading or level outside the range the hardware can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SampleError {
    #[error("raw sample {0} is outside the ADC range 0..=1023")]
    RawOutOfRange(u16),
    #[error("battery percentage {0} is above 100")]
    PercentageOutOfRange(u8),
}

/// Rejected reporter or calibration settings
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ConfigError {
    #[error("resistance must be positive and finite, got {0} ohms")]
    InvalidResistance(f32),
    #[error("supply voltage must be positive and finite, got {0} V")]
    InvalidSupplyVoltage(f32),
    #[error("calibration yields a full-charge reading of zero")]
    ZeroFullScale,
    #[error("calibration yields a full-charge reading of {0}, above the ADC maximum of 1023")]
    FullScaleAboveAdc(u16),
    #[error("hysteresis margin {0} is above 100 percentage points")]
    MarginOutOfRange(u8),
    #[error("low battery floor {0} is above 100 percent")]
    FloorOutOfRange(u8),
    #[error("load thresholds {partial_volts} V / {loaded_volts} V are not ordered non-negative voltages")]
    InvalidLoadThresholds { partial_volts: f32, loaded_volts: f32 },
}

/// A payload the backend could not turn back into a battery level
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("payload is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("payload has {0} bytes, expected 1 or 2")]
    Length(usize),
    #[error("decrypted text {0:?} is not a hex byte")]
    NotHexDigits(String),
    #[error("decoded level {0} is above 100")]
    LevelOutOfRange(u8),
}
