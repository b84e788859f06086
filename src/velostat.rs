//! Crude load detection with a velostat sheet.
//!
//! Pressing on the sheet lowers its resistance, which raises the voltage it
//! produces in its divider. Two voltage thresholds split the reading into
//! three bands, enough to tell an empty gas tank or a free table from a
//! loaded one.

use crate::calibration::RawSample;
use crate::error::ConfigError;
use crate::sensor::AnalogSampler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadBand {
    Empty,
    Partial,
    Loaded,
}

/// One velostat read: the sheet voltage and the band it falls in
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadReading {
    pub volts: f32,
    pub band: LoadBand,
}

/// Voltage thresholds between the load bands
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadThresholds {
    partial_volts: f32,
    loaded_volts: f32,
}

impl LoadThresholds {
    pub fn new(partial_volts: f32, loaded_volts: f32) -> Result<Self, ConfigError> {
        if !(partial_volts.is_finite() && loaded_volts.is_finite())
            || partial_volts < 0.0
            || loaded_volts < partial_volts
        {
            return Err(ConfigError::InvalidLoadThresholds {
                partial_volts,
                loaded_volts,
            });
        }
        Ok(Self {
            partial_volts,
            loaded_volts,
        })
    }

    pub fn partial_volts(&self) -> f32 {
        self.partial_volts
    }

    pub fn loaded_volts(&self) -> f32 {
        self.loaded_volts
    }

    /// A voltage at a threshold belongs to the band above it.
    pub fn classify_volts(&self, volts: f32) -> LoadBand {
        if volts >= self.loaded_volts {
            LoadBand::Loaded
        } else if volts >= self.partial_volts {
            LoadBand::Partial
        } else {
            LoadBand::Empty
        }
    }

    pub fn classify(&self, sample: RawSample) -> LoadBand {
        self.classify_volts(sample.volts())
    }
}

impl Default for LoadThresholds {
    fn default() -> Self {
        Self {
            partial_volts: 1.0,
            loaded_volts: 2.5,
        }
    }
}

/// A velostat sheet on an analog channel
pub struct VelostatSensor<S> {
    sampler: S,
    thresholds: LoadThresholds,
}

impl<S: AnalogSampler> VelostatSensor<S> {
    pub fn new(sampler: S, thresholds: LoadThresholds) -> Self {
        Self { sampler, thresholds }
    }

    /// The sheet voltage, in the range [0, 5]
    pub fn read_volts(&mut self) -> anyhow::Result<f32> {
        Ok(self.sampler.read_raw()?.volts())
    }

    pub fn read_band(&mut self) -> anyhow::Result<LoadReading> {
        let volts = self.read_volts()?;
        Ok(LoadReading {
            volts,
            band: self.thresholds.classify_volts(volts),
        })
    }

    pub fn sampler_mut(&mut self) -> &mut S {
        &mut self.sampler
    }
}

#[test]
fn test_classify_bands() {
    let thresholds = LoadThresholds::default();
    assert_eq!(thresholds.classify_volts(0.2), LoadBand::Empty);
    assert_eq!(thresholds.classify_volts(1.0), LoadBand::Partial);
    assert_eq!(thresholds.classify_volts(2.49), LoadBand::Partial);
    assert_eq!(thresholds.classify_volts(2.5), LoadBand::Loaded);
    assert_eq!(thresholds.classify(RawSample::new(1023).unwrap()), LoadBand::Loaded);
    assert_eq!(thresholds.classify(RawSample::new(0).unwrap()), LoadBand::Empty);
}

#[test]
fn test_thresholds_must_be_ordered() {
    assert!(LoadThresholds::new(2.0, 1.0).is_err());
    assert!(LoadThresholds::new(-0.5, 1.0).is_err());
    assert!(LoadThresholds::new(f32::NAN, 1.0).is_err());
    assert!(LoadThresholds::new(1.0, 1.0).is_ok());
}

#[test]
fn test_sensor_reads_band() {
    use crate::sensor::ReplaySampler;

    let mut sampler = ReplaySampler::default();
    // 0.49 V, 2.0 V, 4.0 V
    for raw in [100, 409, 818] {
        sampler.push(RawSample::new(raw).unwrap());
    }
    let mut sensor = VelostatSensor::new(sampler, LoadThresholds::default());
    assert_eq!(sensor.read_band().unwrap().band, LoadBand::Empty);
    let partial = sensor.read_band().unwrap();
    assert_eq!(partial.band, LoadBand::Partial);
    assert!((partial.volts - 2.0).abs() < 0.01);
    assert_eq!(sensor.read_band().unwrap().band, LoadBand::Loaded);
    assert!(sensor.read_band().is_err());
}
