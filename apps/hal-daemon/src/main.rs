use anyhow::Result;
use clap::{Parser, ValueEnum};
use iio_transport::{Backend, MockBackend, MockChannel, MockDevice};
use sensor_hal::{Event, HalConfig, SensorHal};
use serde::Serialize;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hal-daemon", version, about = "IIO sensor bridge daemon")]
struct Args {
    /// Remote context endpoint; defaults to $IIO_ENDPOINT
    #[arg(long)]
    endpoint: Option<String>,

    /// Transport backend to use
    #[arg(long, value_enum, default_value_t = BackendKind::Mock)]
    backend: BackendKind,

    /// Logical sensor handles to enable at startup
    #[arg(long = "enable", value_delimiter = ',')]
    enable: Vec<i32>,

    /// Sampling period to request for enabled sensors, microseconds
    #[arg(long, default_value_t = 10_000)]
    period_us: u64,

    /// Poll buffer capacity
    #[arg(long, default_value_t = 16)]
    capacity: usize,

    /// Stop after this many polls (runs forever when omitted)
    #[arg(long)]
    polls: Option<u64>,

    /// Dump metrics text every N polls (0 disables)
    #[arg(long, default_value_t = 0)]
    metrics_every: u64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum BackendKind {
    /// In-process mock topology, portable everywhere. Native transports
    /// arrive with the corresponding iio-transport features.
    Mock,
}

/// One JSON line per event, stamped with wall-clock time for log shipping.
#[derive(Serialize)]
struct EventLine<'a> {
    ts: String,
    #[serde(flatten)]
    event: &'a Event,
}

fn main() -> Result<()> {
    setup_tracing();
    let args = Args::parse();

    let mut config = HalConfig::from_env();
    if let Some(endpoint) = &args.endpoint {
        config.endpoint = endpoint.clone();
    }

    info!("iio sensor bridge starting against {}", config.endpoint);

    let backend: Arc<dyn Backend> = match args.backend {
        BackendKind::Mock => Arc::new(demo_backend()),
    };

    let mut hal = SensorHal::new(config, backend)
        .map_err(|e| anyhow::anyhow!("failed to start HAL: {e}"))?;

    for descriptor in hal.descriptors() {
        info!(
            "sensor {}: {} ({}, {:?})",
            descriptor.handle, descriptor.label, descriptor.device_name, descriptor.kind,
        );
    }

    for handle in &args.enable {
        if let Err(err) = hal.activate(*handle, true) {
            warn!("cannot enable sensor {handle}: {err}");
            continue;
        }
        let period_ns = args.period_us.saturating_mul(1000).min(i64::MAX as u64) as i64;
        if let Err(err) = hal.batch(*handle, period_ns, 0) {
            warn!("cannot batch sensor {handle}: {err}");
        }
    }

    let mut polled = 0u64;
    loop {
        let events = hal.poll(args.capacity);
        for event in &events {
            let line = EventLine {
                ts: now_rfc3339(),
                event,
            };
            match serde_json::to_string(&line) {
                Ok(json) => println!("{json}"),
                Err(err) => warn!("failed to serialize event: {err}"),
            }
        }

        polled += 1;
        if args.metrics_every > 0 && polled % args.metrics_every == 0 {
            print!("{}", hal.metrics().encode_text());
        }
        if let Some(limit) = args.polls {
            if polled >= limit {
                break;
            }
        }
    }

    hal.shutdown();
    info!("iio sensor bridge stopped after {polled} polls");
    Ok(())
}

fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default()
}

/// A small plausible topology so the daemon produces data out of the box:
/// a three-axis accelerometer and gyroscope with rate controls, and a
/// single-channel ambient light sensor.
fn demo_backend() -> MockBackend {
    let accel = MockDevice::new(
        "accel_3d",
        vec![
            MockChannel::input(&[("raw", "981"), ("scale", "0.01")]),
            MockChannel::input(&[("raw", "12")]),
            MockChannel::input(&[("raw", "-35")]),
            MockChannel::input(&[("sampling_frequency", "50")]),
        ],
    );
    let gyro = MockDevice::new(
        "gyro_3d",
        vec![
            MockChannel::input(&[("raw", "150"), ("scale", "0.001")]),
            MockChannel::input(&[("raw", "-220")]),
            MockChannel::input(&[("raw", "40")]),
            MockChannel::input(&[("sampling_frequency", "100")]),
        ],
    );
    let als = MockDevice::new("als", vec![MockChannel::input(&[("raw", "420")])]);
    MockBackend::with_devices(vec![accel, gyro, als])
}
