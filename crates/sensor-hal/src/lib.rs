//! sensor-hal: maps network-exposed industrial-I/O devices to a fixed set
//! of logical sensor channels.
//!
//! The HAL lazily discovers cataloged devices through an
//! [`iio_transport::Backend`], samples their raw channels from a background
//! loop, and exposes the poll/activate/batch/flush surface a host service
//! manager drives. Control calls that arrive before discovery completes are
//! deferred and replayed once the devices are mapped.

mod catalog;
pub use catalog::{
    by_device_name, by_handle, descriptors, ReportingMode, SensorKind, SensorSpec, CATALOG,
    SENSOR_COUNT,
};

mod error;
pub use error::{DiscoveryError, HalError, Result};

mod registry;
pub use registry::{DeviceEntry, EntrySnapshot, Registry};

mod discovery;
pub use discovery::discover;

mod control;
mod sampler;

mod events;
pub use events::{Event, SampleEvent};

mod metrics;
pub use metrics::{HalMetrics, MetricsHub};

mod hal;
pub use hal::{HalConfig, SensorHal, ENDPOINT_ENV};
