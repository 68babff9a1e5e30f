//! iio-transport: abstractions over remote industrial-I/O contexts
//!
//! This crate provides the narrow interface through which the sensor HAL
//! talks to a population of network-exposed I/O devices: open a context to
//! an endpoint, enumerate devices and channels, read and write channel
//! attributes. Backends are feature-gated; the default build enables a
//! `mock` backend so that binaries and tests compile on any host without
//! the native client library.

mod error;
pub use error::{Result, TransportError};

mod traits;
pub use traits::{Backend, Channel, ChannelRef, Context, Device, DeviceRef};

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockBackend, MockChannel, MockDevice};
