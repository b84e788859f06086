use batteryuplink::backend::decode_level;
use batteryuplink::uplink::{WireEncoding, SEND_FRAME_PREFIX};
use batteryuplink::{
    BatteryGauge, BatteryPercentage, CalibrationProfile, RawSample, ReplaySampler, ReporterConfig,
    SendOutcome, SerialTransport, SkipReason, UplinkReporter,
};

fn pct(value: u8) -> BatteryPercentage {
    BatteryPercentage::new(value).unwrap()
}

fn sent_frames(written: &[u8]) -> Vec<String> {
    String::from_utf8(written.to_vec())
        .unwrap()
        .lines()
        .filter_map(|line| line.strip_prefix(SEND_FRAME_PREFIX))
        .map(str::to_string)
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_low_battery_then_too_soon() {
    let transport = SerialTransport::new(Vec::new());
    let mut reporter = UplinkReporter::new(ReporterConfig::default(), transport).unwrap();

    let first = reporter.maybe_send(0, 1000, pct(25)).await.unwrap();
    let second = reporter.maybe_send(500, 1000, pct(90)).await.unwrap();

    assert_eq!(first, SendOutcome::Skipped(SkipReason::LowBattery));
    assert_eq!(second, SendOutcome::Skipped(SkipReason::TooSoon));
    assert!(reporter.into_transport().into_inner().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_gauge_to_backend() {
    let calibration = CalibrationProfile::new(1000.0, 10000.0, 9.0).unwrap();
    assert_eq!(calibration.max_raw_reading(), 167);

    let sampler: ReplaySampler = [167, 150, 120, 40]
        .into_iter()
        .map(|raw| RawSample::new(raw).unwrap())
        .collect();
    let mut gauge = BatteryGauge::new(sampler, calibration);

    let mut reporter = UplinkReporter::new(ReporterConfig::default(), SerialTransport::new(Vec::new())).unwrap();
    let mut outcomes = Vec::new();
    for step in 0..4u64 {
        let reading = gauge.read_percentage().unwrap();
        outcomes.push(reporter.maybe_send(step * 10_000, 5_000, reading).await.unwrap());
    }

    // 150/167 -> 90%, 120/167 -> 72%, 40/167 -> 24%
    assert_eq!(
        outcomes,
        [
            SendOutcome::Sent(pct(100)),
            SendOutcome::Sent(pct(90)),
            SendOutcome::Sent(pct(72)),
            SendOutcome::Skipped(SkipReason::LowBattery),
        ]
    );

    let written = reporter.into_transport().into_inner();
    let levels: Vec<u8> = sent_frames(&written)
        .iter()
        .map(|frame| decode_level(frame, WireEncoding::Plain).unwrap().value())
        .collect();
    assert_eq!(levels, [100, 90, 72]);
}

#[tokio::test(start_paused = true)]
async fn test_obfuscated_frames_reach_backend() {
    let config = ReporterConfig::default().with_wire_encoding(WireEncoding::Rot47Ascii, Default::default());
    let mut reporter = UplinkReporter::new(config, SerialTransport::new(Vec::new())).unwrap();
    for (step, level) in [31u8, 64, 99].into_iter().enumerate() {
        let outcome = reporter
            .maybe_send(step as u64 * 2, 1, pct(level))
            .await
            .unwrap();
        assert_eq!(outcome, SendOutcome::Sent(pct(level)));
    }

    let written = reporter.into_transport().into_inner();
    let frames = sent_frames(&written);
    assert!(frames.iter().all(|frame| frame.len() == 4));
    let levels: Vec<u8> = frames
        .iter()
        .map(|frame| decode_level(frame, WireEncoding::Rot47Ascii).unwrap().value())
        .collect();
    assert_eq!(levels, [31, 64, 99]);
}
