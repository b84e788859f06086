//! Debounces the battery percentage before it is reported.
//!
//! The filter keeps one value, the level to report, and updates it on every
//! observation. Two rules run one after the other:
//!
//! 1. any reading at or below the reported level is taken as is
//! 2. any reading above `reported - margin` is taken as is
//!
//! Rule 2 runs even when rule 1 already fired, and every increase satisfies
//! it, so with both rules enabled every reading is accepted. Deployed devices
//! behave like this and the backend expects it. [`HysteresisRule::NearbyOnly`]
//! gives the damped behaviour of the band rule alone, which holds the level
//! through drops of `margin` points or more.

use log::debug;

use crate::calibration::BatteryPercentage;

/// Which of the update rules the filter applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HysteresisRule {
    /// Accept decreases, then accept anything within the band
    #[default]
    AcceptDecreasesAndNearby,
    /// Only accept readings within the band or above the reported level
    NearbyOnly,
}

#[derive(Debug, Clone)]
pub struct BatteryLevelFilter {
    margin_percent: u8,
    rule: HysteresisRule,
    reported_level: Option<BatteryPercentage>,
}

impl BatteryLevelFilter {
    pub const DEFAULT_MARGIN_PERCENT: u8 = 5;

    pub const fn new(margin_percent: u8, rule: HysteresisRule) -> Self {
        Self {
            margin_percent,
            rule,
            reported_level: None,
        }
    }

    /// Feed a new reading and get back the level to report.
    ///
    /// The first reading after construction or [`reset`](Self::reset) is
    /// taken unconditionally.
    pub fn observe(&mut self, reading: BatteryPercentage) -> BatteryPercentage {
        let mut level = *self.reported_level.get_or_insert(reading);

        if self.rule == HysteresisRule::AcceptDecreasesAndNearby && reading <= level {
            level = reading;
        }
        // Deliberately not an else branch: this check sees the level rule 1 just wrote.
        let band_floor = i16::from(level.value()) - i16::from(self.margin_percent);
        if i16::from(reading.value()) > band_floor {
            level = reading;
        }

        debug!("battery filter: observed {reading}, reporting {level}");
        self.reported_level = Some(level);
        level
    }

    /// The level to report, or `None` before the first observation
    pub fn reported_level(&self) -> Option<BatteryPercentage> {
        self.reported_level
    }

    pub fn margin_percent(&self) -> u8 {
        self.margin_percent
    }

    pub fn rule(&self) -> HysteresisRule {
        self.rule
    }

    /// Forget the reported level; the next observation initialises it again.
    pub fn reset(&mut self) {
        self.reported_level = None;
    }
}

impl Default for BatteryLevelFilter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MARGIN_PERCENT, HysteresisRule::default())
    }
}

#[cfg(test)]
fn observe_all(filter: &mut BatteryLevelFilter, readings: &[u8]) -> Vec<u8> {
    readings
        .iter()
        .map(|&r| filter.observe(BatteryPercentage::new(r).unwrap()).value())
        .collect()
}

#[test]
fn test_first_reading_is_taken() {
    let mut filter = BatteryLevelFilter::default();
    assert_eq!(filter.reported_level(), None);
    assert_eq!(observe_all(&mut filter, &[37]), [37]);
    assert_eq!(filter.reported_level(), Some(BatteryPercentage::new(37).unwrap()));
}

#[test]
fn test_mixed_sequence() {
    let mut filter = BatteryLevelFilter::default();
    assert_eq!(observe_all(&mut filter, &[80, 76, 90]), [80, 76, 90]);
}

#[test]
fn test_decreases_are_tracked() {
    let mut filter = BatteryLevelFilter::default();
    assert_eq!(observe_all(&mut filter, &[100, 99, 90, 50, 49, 0]), [100, 99, 90, 50, 49, 0]);
}

#[test]
fn test_increases_are_tracked() {
    let mut filter = BatteryLevelFilter::default();
    assert_eq!(observe_all(&mut filter, &[10, 12, 40, 41, 100]), [10, 12, 40, 41, 100]);
}

/// With both rules active the filter never holds a value back. This pins the
/// deployed behaviour; see `test_nearby_only_holds_through_large_drops` for
/// what the band rule alone does.
#[test]
fn test_both_rules_accept_every_reading() {
    for previous in 0..=100u8 {
        for reading in 0..=100u8 {
            let mut filter = BatteryLevelFilter::default();
            observe_all(&mut filter, &[previous]);
            assert_eq!(observe_all(&mut filter, &[reading]), [reading]);
        }
    }
}

#[test]
fn test_nearby_only_holds_through_large_drops() {
    let mut filter = BatteryLevelFilter::new(5, HysteresisRule::NearbyOnly);
    // 76 is within the band below 80, 70 is not, 90 is an increase
    assert_eq!(observe_all(&mut filter, &[80, 76, 70, 72, 90]), [80, 76, 76, 72, 90]);
}

#[test]
fn test_nearby_only_band_edge() {
    let mut filter = BatteryLevelFilter::new(5, HysteresisRule::NearbyOnly);
    // 75 is not strictly above 80 - 5
    assert_eq!(observe_all(&mut filter, &[80, 75]), [80, 80]);
    let mut filter = BatteryLevelFilter::new(5, HysteresisRule::NearbyOnly);
    assert_eq!(observe_all(&mut filter, &[80, 76]), [80, 76]);
}

#[test]
fn test_band_below_zero() {
    let mut filter = BatteryLevelFilter::new(5, HysteresisRule::NearbyOnly);
    assert_eq!(observe_all(&mut filter, &[3, 0]), [3, 0]);
}

#[test]
fn test_reset_reinitialises() {
    let mut filter = BatteryLevelFilter::new(5, HysteresisRule::NearbyOnly);
    observe_all(&mut filter, &[90]);
    filter.reset();
    assert_eq!(filter.reported_level(), None);
    assert_eq!(observe_all(&mut filter, &[40]), [40]);
}
