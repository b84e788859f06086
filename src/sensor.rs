//! Analog inputs as seen from the reporting code.
//!
//! The battery and velostat channels are read through [`AnalogSampler`], so
//! nothing here touches a pin. Hardware adapters implement the trait; the
//! binary and the tests use [`ReplaySampler`].

use std::collections::VecDeque;

use anyhow::anyhow;

use crate::calibration::{BatteryPercentage, CalibrationProfile, RawSample};

/// One analog channel
pub trait AnalogSampler {
    fn read_raw(&mut self) -> anyhow::Result<RawSample>;
}

/// Hands out queued samples in order. Reading from an empty queue is an error.
#[derive(Debug, Default, Clone)]
pub struct ReplaySampler {
    samples: VecDeque<RawSample>,
}

impl ReplaySampler {
    pub fn push(&mut self, sample: RawSample) {
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl FromIterator<RawSample> for ReplaySampler {
    fn from_iter<I: IntoIterator<Item = RawSample>>(iter: I) -> Self {
        Self {
            samples: iter.into_iter().collect(),
        }
    }
}

impl AnalogSampler for ReplaySampler {
    fn read_raw(&mut self) -> anyhow::Result<RawSample> {
        self.samples
            .pop_front()
            .ok_or_else(|| anyhow!("no samples left to replay"))
    }
}

/// The battery channel together with its divider calibration
pub struct BatteryGauge<S> {
    sampler: S,
    calibration: CalibrationProfile,
}

impl<S: AnalogSampler> BatteryGauge<S> {
    pub fn new(sampler: S, calibration: CalibrationProfile) -> Self {
        Self {
            sampler,
            calibration,
        }
    }

    pub fn read_percentage(&mut self) -> anyhow::Result<BatteryPercentage> {
        let raw = self.sampler.read_raw()?;
        Ok(self.calibration.percentage(raw))
    }

    /// The voltage at the ADC pin, after the divider
    pub fn read_volts(&mut self) -> anyhow::Result<f32> {
        Ok(self.sampler.read_raw()?.volts())
    }

    pub fn calibration(&self) -> &CalibrationProfile {
        &self.calibration
    }

    pub fn sampler_mut(&mut self) -> &mut S {
        &mut self.sampler
    }
}

#[test]
fn test_gauge_maps_through_calibration() {
    let calibration = CalibrationProfile::new(1000.0, 10000.0, 9.0).unwrap();
    let sampler: ReplaySampler = [167, 84, 0]
        .into_iter()
        .map(|raw| RawSample::new(raw).unwrap())
        .collect();
    let mut gauge = BatteryGauge::new(sampler, calibration);
    assert_eq!(gauge.read_percentage().unwrap().value(), 100);
    assert_eq!(gauge.read_percentage().unwrap().value(), 50);
    assert_eq!(gauge.read_percentage().unwrap().value(), 0);
    assert!(gauge.read_percentage().is_err());
}

#[test]
fn test_gauge_volts() {
    let calibration = CalibrationProfile::new(1000.0, 10000.0, 9.0).unwrap();
    let mut gauge = BatteryGauge::new(ReplaySampler::default(), calibration);
    gauge.sampler_mut().push(RawSample::new(167).unwrap());
    assert_eq!(gauge.sampler_mut().len(), 1);
    let volts = gauge.read_volts().unwrap();
    assert!((volts - 0.816).abs() < 0.001);
    assert!(gauge.sampler_mut().is_empty());
}
