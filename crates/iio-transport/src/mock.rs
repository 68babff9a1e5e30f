use crate::{Backend, Channel, ChannelRef, Context, Device, DeviceRef, Result, TransportError};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// An in-process channel with a mutable attribute store.
///
/// Tests hold their own `Arc` to a channel and mutate attributes while the
/// HAL samples it through the same handle.
pub struct MockChannel {
    output: bool,
    attrs: Mutex<BTreeMap<String, String>>,
    enabled: AtomicBool,
    enables: AtomicUsize,
}

impl MockChannel {
    /// An input (sample-side) channel carrying the given attributes.
    pub fn input(attrs: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self::new(false, attrs))
    }

    /// An output (write-side) channel carrying the given attributes.
    pub fn output(attrs: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self::new(true, attrs))
    }

    fn new(output: bool, attrs: &[(&str, &str)]) -> Self {
        let map = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            output,
            attrs: Mutex::new(map),
            enabled: AtomicBool::new(false),
            enables: AtomicUsize::new(0),
        }
    }

    fn attrs(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.attrs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Overwrite an attribute value, creating it if absent.
    pub fn set_attribute(&self, name: &str, value: &str) {
        self.attrs().insert(name.to_string(), value.to_string());
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// How many times `enable` was called over the channel's lifetime.
    pub fn enable_count(&self) -> usize {
        self.enables.load(Ordering::Acquire)
    }
}

impl Channel for MockChannel {
    fn is_output(&self) -> bool {
        self.output
    }

    fn attributes(&self) -> Vec<String> {
        self.attrs().keys().cloned().collect()
    }

    fn read_attribute(&self, name: &str) -> Result<String> {
        self.attrs()
            .get(name)
            .cloned()
            .ok_or_else(|| TransportError::NoSuchAttribute(name.to_string()))
    }

    fn write_attribute(&self, name: &str, value: &str) -> Result<()> {
        let mut attrs = self.attrs();
        match attrs.get_mut(name) {
            Some(slot) => {
                *slot = value.to_string();
                Ok(())
            }
            None => Err(TransportError::NoSuchAttribute(name.to_string())),
        }
    }

    fn enable(&self) -> Result<()> {
        self.enabled.store(true, Ordering::Release);
        self.enables.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn disable(&self) -> Result<()> {
        self.enabled.store(false, Ordering::Release);
        Ok(())
    }
}

/// An in-process device holding a fixed channel list.
pub struct MockDevice {
    name: Option<String>,
    channels: Vec<Arc<MockChannel>>,
}

impl MockDevice {
    pub fn new(name: &str, channels: Vec<Arc<MockChannel>>) -> Arc<Self> {
        Arc::new(Self {
            name: Some(name.to_string()),
            channels,
        })
    }

    /// A device whose remote reference cannot be read.
    pub fn unreadable() -> Arc<Self> {
        Arc::new(Self {
            name: None,
            channels: Vec::new(),
        })
    }
}

impl Device for MockDevice {
    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    fn channels(&self) -> Vec<ChannelRef> {
        self.channels
            .iter()
            .map(|ch| ch.clone() as ChannelRef)
            .collect()
    }
}

struct MockContext {
    devices: Vec<Arc<MockDevice>>,
}

impl Context for MockContext {
    fn devices(&self) -> Vec<DeviceRef> {
        self.devices
            .iter()
            .map(|dev| dev.clone() as DeviceRef)
            .collect()
    }
}

/// A backend serving contexts over a swappable in-process topology.
pub struct MockBackend {
    devices: Mutex<Vec<Arc<MockDevice>>>,
    refuse: AtomicBool,
    connects: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::with_devices(Vec::new())
    }

    pub fn with_devices(devices: Vec<Arc<MockDevice>>) -> Self {
        Self {
            devices: Mutex::new(devices),
            refuse: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
        }
    }

    /// Replace the topology served by future connects.
    pub fn set_devices(&self, devices: Vec<Arc<MockDevice>>) {
        *self.devices.lock().unwrap_or_else(PoisonError::into_inner) = devices;
    }

    /// Make subsequent connects fail, simulating an unreachable endpoint.
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::Release);
    }

    /// How many connect attempts this backend has seen.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::Acquire)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for MockBackend {
    fn connect(&self, endpoint: &str) -> Result<Box<dyn Context>> {
        self.connects.fetch_add(1, Ordering::AcqRel);
        if self.refuse.load(Ordering::Acquire) {
            return Err(TransportError::Unreachable(endpoint.to_string()));
        }
        let devices = self
            .devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        tracing::debug!("serving mock context for {endpoint} with {} devices", devices.len());
        Ok(Box::new(MockContext { devices }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_read_write_roundtrip() {
        let ch = MockChannel::input(&[("raw", "42")]);
        assert_eq!(ch.read_attribute("raw").unwrap(), "42");
        ch.write_attribute("raw", "43").unwrap();
        assert_eq!(ch.read_attribute("raw").unwrap(), "43");
    }

    #[test]
    fn missing_attribute_is_an_error() {
        let ch = MockChannel::input(&[]);
        assert!(matches!(
            ch.read_attribute("raw"),
            Err(TransportError::NoSuchAttribute(_))
        ));
        assert!(ch.write_attribute("raw", "1").is_err());
    }

    #[test]
    fn enable_disable_and_count() {
        let ch = MockChannel::input(&[("raw", "0")]);
        assert!(!ch.is_enabled());
        ch.enable().unwrap();
        assert!(ch.is_enabled());
        ch.disable().unwrap();
        assert!(!ch.is_enabled());
        assert_eq!(ch.enable_count(), 1);
    }

    #[test]
    fn refused_connection_reports_unreachable() {
        let backend = MockBackend::new();
        backend.refuse_connections(true);
        assert!(matches!(
            backend.connect("ip:10.0.0.1"),
            Err(TransportError::Unreachable(_))
        ));
        assert_eq!(backend.connect_count(), 1);
    }

    #[test]
    fn topology_swap_changes_future_contexts() {
        let backend =
            MockBackend::with_devices(vec![MockDevice::new("accel_3d", vec![])]);
        let ctx = backend.connect("ip:local").unwrap();
        assert_eq!(ctx.devices().len(), 1);

        backend.set_devices(vec![
            MockDevice::new("accel_3d", vec![]),
            MockDevice::new("gyro_3d", vec![]),
        ]);
        let ctx = backend.connect("ip:local").unwrap();
        assert_eq!(ctx.devices().len(), 2);
    }
}
