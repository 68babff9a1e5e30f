use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Clone)]
pub struct HalMetrics {
    pub discovery_runs: IntCounter,
    pub sensors_mapped: IntGauge,
    pub active_sensors: IntGauge,
    pub samples_read: IntCounter,
    pub events_emitted: IntCounter,
}

#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub hal: HalMetrics,
}

impl MetricsHub {
    pub fn new() -> Result<Self, String> {
        let registry = Registry::new();
        let discovery_runs =
            IntCounter::new("iio_hal_discovery_runs", "Completed discovery runs")
                .map_err(|e| format!("metrics init error: {e}"))?;
        let sensors_mapped = IntGauge::new(
            "iio_hal_sensors_mapped",
            "Sensors mapped by the last discovery run",
        )
        .map_err(|e| format!("metrics init error: {e}"))?;
        let active_sensors = IntGauge::new(
            "iio_hal_active_sensors",
            "Sensors currently enabled and initialized",
        )
        .map_err(|e| format!("metrics init error: {e}"))?;
        let samples_read = IntCounter::new(
            "iio_hal_samples_read",
            "Raw channel reads performed by the sampling loop",
        )
        .map_err(|e| format!("metrics init error: {e}"))?;
        let events_emitted = IntCounter::new(
            "iio_hal_events_emitted",
            "Events returned to poll callers",
        )
        .map_err(|e| format!("metrics init error: {e}"))?;
        let hal = HalMetrics {
            discovery_runs,
            sensors_mapped,
            active_sensors,
            samples_read,
            events_emitted,
        };
        let _ = registry.register(Box::new(hal.discovery_runs.clone()));
        let _ = registry.register(Box::new(hal.sensors_mapped.clone()));
        let _ = registry.register(Box::new(hal.active_sensors.clone()));
        let _ = registry.register(Box::new(hal.samples_read.clone()));
        let _ = registry.register(Box::new(hal.events_emitted.clone()));
        Ok(Self { registry, hal })
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}
