//! Decides when to report the battery level and emits the modem commands.
//!
//! Every call to [`UplinkReporter::maybe_send`] feeds the filter, then checks
//! the send interval and the low-battery floor, in that order. Once the
//! interval has elapsed the gate advances whether or not anything is sent,
//! so a flat battery does not cause a send attempt on every loop iteration.
//!
//! Transmission is fire and forget. The modem never acknowledges a frame,
//! nothing is retried, and a failed write is reported to the caller once.
//!
//! The reporter is meant to be owned by the single control loop. All
//! operations take `&mut self`; sharing it between tasks needs a mutex
//! around the whole reporter.

use log::{info, warn};
use tokio::time::sleep;

use crate::battery_filter::BatteryLevelFilter;
use crate::calibration::BatteryPercentage;
use crate::config::ReporterConfig;
use crate::error::ConfigError;

use super::payload::{UplinkPayload, RESET_COMMAND};
use super::transport::UplinkTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The send interval has not elapsed since the last attempt
    TooSoon,
    /// The filtered level is at or below the low-battery floor
    LowBattery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent(BatteryPercentage),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReporterState {
    Idle,
    /// Between the reset command and the end of the post-send delay
    Sending,
}

/// Rate limit for send attempts
#[derive(Debug, Clone, Default)]
pub struct TransmissionGate {
    last_send_millis: Option<u64>,
}

impl TransmissionGate {
    /// Opens and records `now_millis` if more than `interval_millis` have
    /// passed since the last opening. A gate that never opened is open.
    /// A clock reading older than the last opening counts as no time passed.
    pub fn try_open(&mut self, now_millis: u64, interval_millis: u64) -> bool {
        if let Some(last) = self.last_send_millis {
            if now_millis.saturating_sub(last) <= interval_millis {
                return false;
            }
        }
        self.last_send_millis = Some(now_millis);
        true
    }

    pub fn last_send_millis(&self) -> Option<u64> {
        self.last_send_millis
    }

    pub fn reset(&mut self) {
        self.last_send_millis = None;
    }
}

pub struct UplinkReporter<T> {
    config: ReporterConfig,
    filter: BatteryLevelFilter,
    gate: TransmissionGate,
    state: ReporterState,
    transport: T,
}

impl<T: UplinkTransport> UplinkReporter<T> {
    pub fn new(config: ReporterConfig, transport: T) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            filter: BatteryLevelFilter::new(config.hysteresis_margin_percent, config.hysteresis_rule),
            gate: TransmissionGate::default(),
            state: ReporterState::Idle,
            config,
            transport,
        })
    }

    /// Filter `reading` and send the result if the interval has elapsed and
    /// the level is above the low-battery floor.
    pub async fn maybe_send(
        &mut self,
        now_millis: u64,
        interval_millis: u64,
        reading: BatteryPercentage,
    ) -> anyhow::Result<SendOutcome> {
        let level = self.filter.observe(reading);

        if !self.gate.try_open(now_millis, interval_millis) {
            return Ok(SendOutcome::Skipped(SkipReason::TooSoon));
        }

        if level.value() <= self.config.low_battery_floor_percent {
            warn!("uplink: battery low at {level}, not sending");
            return Ok(SendOutcome::Skipped(SkipReason::LowBattery));
        }

        self.transmit(level).await?;
        Ok(SendOutcome::Sent(level))
    }

    async fn transmit(&mut self, level: BatteryPercentage) -> anyhow::Result<()> {
        let payload = UplinkPayload::encode(level, self.config.hex_case, self.config.wire_encoding);
        info!(
            "uplink: sending {level} as {} (rot47 {})",
            payload.digits(),
            payload.obfuscated()
        );

        self.state = ReporterState::Sending;
        let result = self.emit(&payload).await;
        self.state = ReporterState::Idle;
        result
    }

    /// The modem handles one command at a time and has no flow control, so
    /// each delay runs to completion before the next write.
    async fn emit(&mut self, payload: &UplinkPayload) -> anyhow::Result<()> {
        self.transport.send_command(RESET_COMMAND).await?;
        sleep(self.config.reset_delay).await;
        self.transport.send_command(&payload.send_command()).await?;
        sleep(self.config.post_send_delay).await;
        Ok(())
    }

    pub fn config(&self) -> &ReporterConfig {
        &self.config
    }

    pub fn filter(&self) -> &BatteryLevelFilter {
        &self.filter
    }

    pub fn gate(&self) -> &TransmissionGate {
        &self.gate
    }

    pub fn state(&self) -> ReporterState {
        self.state
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Back to the state right after construction
    pub fn reset(&mut self) {
        self.filter.reset();
        self.gate.reset();
        self.state = ReporterState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::{Duration, Instant};

    use super::*;
    use crate::uplink::{HexCase, SerialTransport, WireEncoding};

    fn pct(value: u8) -> BatteryPercentage {
        BatteryPercentage::new(value).unwrap()
    }

    fn reporter(config: ReporterConfig) -> UplinkReporter<SerialTransport<Vec<u8>>> {
        UplinkReporter::new(config, SerialTransport::new(Vec::new())).unwrap()
    }

    fn written(reporter: &UplinkReporter<SerialTransport<Vec<u8>>>) -> String {
        String::from_utf8(reporter.transport().get_ref().clone()).unwrap()
    }

    struct FailingTransport;

    impl UplinkTransport for FailingTransport {
        async fn send_command(&mut self, _command: &str) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("serial port closed"))
        }
    }

    #[test]
    fn test_gate_first_call_opens() {
        let mut gate = TransmissionGate::default();
        assert!(gate.try_open(0, 1000));
        assert_eq!(gate.last_send_millis(), Some(0));
        assert!(!gate.try_open(1000, 1000));
        assert!(gate.try_open(1001, 1000));
        assert_eq!(gate.last_send_millis(), Some(1001));
    }

    #[test]
    fn test_gate_clock_going_backwards_is_too_soon() {
        let mut gate = TransmissionGate::default();
        assert!(gate.try_open(5000, 1000));
        assert!(!gate.try_open(10, 1000));
        assert_eq!(gate.last_send_millis(), Some(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sends_reset_then_frame() {
        let mut reporter = reporter(ReporterConfig::default());
        let outcome = reporter.maybe_send(0, 1000, pct(75)).await.unwrap();
        assert_eq!(outcome, SendOutcome::Sent(pct(75)));
        assert_eq!(written(&reporter), "AT$RC\r\nAT$SF=4B\r\n");
        assert_eq!(reporter.state(), ReporterState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_low_battery_boundary() {
        let mut reporter = reporter(ReporterConfig::default());
        let outcome = reporter.maybe_send(0, 0, pct(30)).await.unwrap();
        assert_eq!(outcome, SendOutcome::Skipped(SkipReason::LowBattery));
        assert_eq!(written(&reporter), "");

        let outcome = reporter.maybe_send(1, 0, pct(31)).await.unwrap();
        assert_eq!(outcome, SendOutcome::Sent(pct(31)));
        assert_eq!(written(&reporter), "AT$RC\r\nAT$SF=1F\r\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_low_battery_still_advances_gate() {
        let mut reporter = reporter(ReporterConfig::default());
        let outcome = reporter.maybe_send(0, 1000, pct(25)).await.unwrap();
        assert_eq!(outcome, SendOutcome::Skipped(SkipReason::LowBattery));
        assert_eq!(reporter.gate().last_send_millis(), Some(0));

        let outcome = reporter.maybe_send(500, 1000, pct(90)).await.unwrap();
        assert_eq!(outcome, SendOutcome::Skipped(SkipReason::TooSoon));
        // the filter saw the reading even though nothing was sent
        assert_eq!(reporter.filter().reported_level(), Some(pct(90)));
        assert_eq!(written(&reporter), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_twice_within_interval() {
        let mut reporter = reporter(ReporterConfig::default());
        let mut sent_at = Vec::new();
        for now in (0..10_000).step_by(250) {
            if let SendOutcome::Sent(_) = reporter.maybe_send(now, 1000, pct(80)).await.unwrap() {
                sent_at.push(now);
            }
        }
        assert_eq!(sent_at, [0, 1250, 2500, 3750, 5000, 6250, 7500, 8750]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delays_run_in_sequence() {
        let config = ReporterConfig::default()
            .with_delays(Duration::from_millis(100), Duration::from_millis(3000));
        let mut reporter = reporter(config);
        let start = Instant::now();
        reporter.maybe_send(0, 0, pct(90)).await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(3100), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(3105), "{elapsed:?}");

        // skipped attempts do not wait
        let start = Instant::now();
        reporter.maybe_send(0, 0, pct(90)).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_obfuscated_wire_encoding() {
        let config = ReporterConfig::default().with_wire_encoding(WireEncoding::Rot47Ascii, HexCase::Lower);
        let mut reporter = reporter(config);
        reporter.maybe_send(0, 0, pct(75)).await.unwrap();
        assert_eq!(written(&reporter), "AT$RC\r\nAT$SF=6333\r\n");
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_floor() {
        let mut reporter = reporter(ReporterConfig::default().with_low_battery_floor(50));
        let outcome = reporter.maybe_send(0, 0, pct(45)).await.unwrap();
        assert_eq!(outcome, SendOutcome::Skipped(SkipReason::LowBattery));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_is_not_retried() {
        let mut reporter = UplinkReporter::new(ReporterConfig::default(), FailingTransport).unwrap();
        assert!(reporter.maybe_send(0, 1000, pct(80)).await.is_err());
        assert_eq!(reporter.state(), ReporterState::Idle);
        assert_eq!(reporter.gate().last_send_millis(), Some(0));

        let outcome = reporter.maybe_send(10, 1000, pct(80)).await.unwrap();
        assert_eq!(outcome, SendOutcome::Skipped(SkipReason::TooSoon));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_clears_gate_and_filter() {
        let mut reporter = reporter(ReporterConfig::default());
        reporter.maybe_send(0, 60_000, pct(80)).await.unwrap();
        reporter.reset();
        assert_eq!(reporter.gate().last_send_millis(), None);
        assert_eq!(reporter.filter().reported_level(), None);
        let outcome = reporter.maybe_send(1, 60_000, pct(70)).await.unwrap();
        assert_eq!(outcome, SendOutcome::Sent(pct(70)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ReporterConfig::default().with_low_battery_floor(200);
        assert!(UplinkReporter::new(config, SerialTransport::new(Vec::new())).is_err());
    }
}
