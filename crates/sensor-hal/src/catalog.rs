//! Static table of the sensor devices this bridge models.
//!
//! The catalog is pure configuration: it maps the device names the remote
//! side enumerates to stable logical handles, and carries the descriptive
//! metadata the registration layer reports for each sensor. Handles are
//! dense (`0..SENSOR_COUNT`) and double as indices into the registry.

use serde::{Deserialize, Serialize};

/// Number of logical sensor channels the catalog models.
pub const SENSOR_COUNT: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Accelerometer,
    LinearAcceleration,
    Gravity,
    RotationVector,
    MagneticField,
    GeomagneticRotation,
    GameRotation,
    Gyroscope,
    AmbientLight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportingMode {
    Continuous,
    OnChange,
}

/// Static description of one logical sensor channel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorSpec {
    /// Device name as enumerated by the remote context.
    pub device_name: &'static str,
    /// Human-readable name reported to the registration layer.
    pub label: &'static str,
    pub vendor: &'static str,
    pub version: u32,
    /// Stable logical id; the only handle callers ever see.
    pub handle: usize,
    pub kind: SensorKind,
    pub max_range: f32,
    pub resolution: f32,
    pub power_ma: f32,
    /// Shortest supported sampling period, microseconds.
    pub min_delay_us: u64,
    /// Longest supported sampling period, microseconds.
    pub max_delay_us: u64,
    pub string_type: &'static str,
    pub reporting: ReportingMode,
}

pub const CATALOG: [SensorSpec; SENSOR_COUNT] = [
    SensorSpec {
        device_name: "accel_3d",
        label: "Accelerometer",
        vendor: "Intel",
        version: 1,
        handle: 0,
        kind: SensorKind::Accelerometer,
        max_range: 1000.0,
        resolution: 1.52e-5,
        power_ma: 0.0,
        min_delay_us: 0,
        max_delay_us: 20_000,
        string_type: "sensor.accelerometer",
        reporting: ReportingMode::Continuous,
    },
    SensorSpec {
        device_name: "incli_3d",
        label: "Inclinometer",
        vendor: "Intel",
        version: 1,
        handle: 1,
        kind: SensorKind::LinearAcceleration,
        max_range: 1000.0,
        resolution: 0.1,
        power_ma: 0.0,
        min_delay_us: 0,
        max_delay_us: 20_000,
        string_type: "sensor.inclinometer",
        reporting: ReportingMode::Continuous,
    },
    SensorSpec {
        device_name: "gravity",
        label: "Gravity",
        vendor: "Intel",
        version: 1,
        handle: 2,
        kind: SensorKind::Gravity,
        max_range: 1000.0,
        resolution: 0.1,
        power_ma: 0.0,
        min_delay_us: 0,
        max_delay_us: 20_000,
        string_type: "sensor.gravity",
        reporting: ReportingMode::Continuous,
    },
    SensorSpec {
        device_name: "dev_rotation",
        label: "Device rotation",
        vendor: "Intel",
        version: 1,
        handle: 3,
        kind: SensorKind::RotationVector,
        max_range: 1000.0,
        resolution: 0.1,
        power_ma: 0.0,
        min_delay_us: 0,
        max_delay_us: 20_000,
        string_type: "sensor.dev_rotation",
        reporting: ReportingMode::Continuous,
    },
    SensorSpec {
        device_name: "magn_3d",
        label: "Magnetometer",
        vendor: "Intel",
        version: 1,
        handle: 4,
        kind: SensorKind::MagneticField,
        max_range: 1000.0,
        resolution: 0.1,
        power_ma: 0.0,
        min_delay_us: 0,
        max_delay_us: 20_000,
        string_type: "sensor.magn_3d",
        reporting: ReportingMode::Continuous,
    },
    SensorSpec {
        device_name: "geomagnetic_orientation",
        label: "Geomagnetic orientation",
        vendor: "Intel",
        version: 1,
        handle: 5,
        kind: SensorKind::GeomagneticRotation,
        max_range: 100.0,
        resolution: 0.1,
        power_ma: 0.0,
        min_delay_us: 0,
        max_delay_us: 20_000,
        string_type: "sensor.geomagnetic_orientation",
        reporting: ReportingMode::Continuous,
    },
    SensorSpec {
        device_name: "relative_orientation",
        label: "Relative orientation",
        vendor: "Intel",
        version: 1,
        handle: 6,
        kind: SensorKind::GameRotation,
        max_range: 100.0,
        resolution: 0.1,
        power_ma: 0.0,
        min_delay_us: 0,
        max_delay_us: 20_000,
        string_type: "sensor.relative_orientation",
        reporting: ReportingMode::Continuous,
    },
    SensorSpec {
        device_name: "gyro_3d",
        label: "Gyroscope",
        vendor: "Intel",
        version: 1,
        handle: 7,
        kind: SensorKind::Gyroscope,
        max_range: 100.0,
        resolution: 0.1,
        power_ma: 0.0,
        min_delay_us: 0,
        max_delay_us: 20_000,
        string_type: "sensor.gyro_3d",
        reporting: ReportingMode::Continuous,
    },
    SensorSpec {
        device_name: "als",
        label: "Ambient light sensor",
        vendor: "Intel",
        version: 1,
        handle: 8,
        kind: SensorKind::AmbientLight,
        max_range: 100.0,
        resolution: 0.1,
        power_ma: 0.0,
        min_delay_us: 0,
        max_delay_us: 20_000,
        string_type: "sensor.als",
        reporting: ReportingMode::OnChange,
    },
];

/// Look up a catalog entry by the device name the remote side reports.
pub fn by_device_name(name: &str) -> Option<&'static SensorSpec> {
    CATALOG.iter().find(|spec| spec.device_name == name)
}

/// Look up a catalog entry by logical handle.
pub fn by_handle(handle: usize) -> Option<&'static SensorSpec> {
    CATALOG.get(handle)
}

/// The full sensor list, for the registration layer.
pub fn descriptors() -> &'static [SensorSpec] {
    &CATALOG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_dense_and_stable() {
        for (index, spec) in CATALOG.iter().enumerate() {
            assert_eq!(spec.handle, index);
        }
    }

    #[test]
    fn device_names_resolve() {
        assert_eq!(by_device_name("accel_3d").map(|s| s.handle), Some(0));
        assert_eq!(by_device_name("als").map(|s| s.handle), Some(8));
        assert!(by_device_name("thermo_1d").is_none());
    }

    #[test]
    fn handle_lookup_bounds() {
        assert!(by_handle(SENSOR_COUNT - 1).is_some());
        assert!(by_handle(SENSOR_COUNT).is_none());
    }

    #[test]
    fn light_sensor_reports_on_change() {
        let als = by_device_name("als").map(|s| s.reporting);
        assert_eq!(als, Some(ReportingMode::OnChange));
    }
}
