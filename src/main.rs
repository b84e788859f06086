//! Runs the device loop against replayed samples.
//!
//! Each stdin line holds a raw battery sample and, optionally, a raw velostat
//! sample, both in ADC counts. Modem commands go to stdout as they would go
//! to the serial port; everything else is logged to stderr, filtered by
//! `RUST_LOG` (default `info`).
//!
//! ```text
//! printf '160 300\n150 900\n' | REPORT_INTERVAL_MS=500 batteryuplink
//! ```

use anyhow::Context;
use log::info;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{sleep, Instant};

use batteryuplink::velostat::VelostatSensor;
use batteryuplink::{BatteryGauge, DeviceConfig, RawSample, ReplaySampler, SerialTransport, UplinkReporter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = DeviceConfig::from_env()?;
    info!(
        "calibrated: full charge reads {} counts",
        config.calibration.max_raw_reading()
    );

    let mut gauge = BatteryGauge::new(ReplaySampler::default(), config.calibration);
    let mut velostat = VelostatSensor::new(ReplaySampler::default(), config.load_thresholds);
    let mut reporter = UplinkReporter::new(config.reporter, SerialTransport::new(tokio::io::stdout()))?;

    let interval_millis = u64::try_from(config.report_interval.as_millis())?;
    let start = Instant::now();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let mut fields = line.split_whitespace();
        let Some(battery) = fields.next() else {
            continue;
        };
        gauge.sampler_mut().push(parse_sample(battery)?);

        if let Some(sheet) = fields.next() {
            velostat.sampler_mut().push(parse_sample(sheet)?);
            let load = velostat.read_band()?;
            info!("velostat: {:.2} V, {:?}", load.volts, load.band);
        }

        let reading = gauge.read_percentage()?;
        let now_millis = u64::try_from(start.elapsed().as_millis())?;
        let outcome = reporter.maybe_send(now_millis, interval_millis, reading).await?;
        info!("battery: {reading} at {now_millis} ms -> {outcome:?}");

        sleep(config.sample_period).await;
    }

    Ok(())
}

fn parse_sample(field: &str) -> anyhow::Result<RawSample> {
    let value: u16 = field
        .parse()
        .with_context(|| format!("sample {field:?} is not a number"))?;
    Ok(RawSample::new(value)?)
}
